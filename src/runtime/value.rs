// パス: src/runtime/value.rs
// 役割: 評価結果の値表現 (Value) と複合値を収めるアリーナ (Heap) を定義する
// 意図: 循環を含む値グラフを ID で表し、表示器が同一性で訪問済み判定できるようにする
// 関連ファイル: src/runtime/interp.rs, src/repl/printer.rs, src/repl/session.rs
//! 値モデル
//!
//! - プリミティブは `Value` に直接保持し、複合値 (タグ付きバリアント・参照セル・レコード) は
//!   `Heap` のスロットに置いて `Value::Obj(ObjId)` で指す。
//! - 複合値の同一性は `ObjId` そのもの。割り当て後にスロットを書き換えることで循環を作れる。
//! - 関数値はホストが管理する `FuncId` で表し、複合値としては扱わない。

use std::fmt;
use std::rc::Rc;

/// ヒープ上の複合値を指す識別子。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub usize);

/// ホストが管理する関数値の識別子。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub usize);

/// 一意性だけを持つアトム (シンボル) の識別子。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Func(FuncId),
    Symbol(SymbolId),
    Null,
    Undefined,
    Obj(ObjId),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// ヒープ上の複合値かどうか。
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Obj(_))
    }

    pub fn as_obj(&self) -> Option<ObjId> {
        match self {
            Value::Obj(id) => Some(*id),
            _ => None,
        }
    }

    /// 診断メッセージ用の分類名。
    pub fn kind_name(&self, heap: &Heap) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Func(_) => "function",
            Value::Symbol(_) => "symbol",
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Obj(id) => match heap.get(*id) {
                Some(Object::Variant { .. }) => "variant",
                Some(Object::Ref { .. }) => "ref",
                Some(Object::Record { .. }) => "record",
                None => "dangling",
            },
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// ヒープスロットに置かれる複合値。
#[derive(Clone, Debug, PartialEq)]
pub enum Object {
    /// 判別子 (タグ) とペイロードを持つバリアント。
    Variant { tag: String, payload: Value },
    /// 単一の参照先を持つ間接セル。
    Ref { target: Value },
    /// 宣言順を保ったフィールド列。
    Record { fields: Vec<(String, Value)> },
}

/// 追記専用の複合値アリーナ。
#[derive(Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, object: Object) -> Value {
        self.objects.push(object);
        Value::Obj(ObjId(self.objects.len() - 1))
    }

    pub fn record(&mut self, fields: Vec<(String, Value)>) -> Value {
        self.alloc(Object::Record { fields })
    }

    pub fn variant(&mut self, tag: impl Into<String>, payload: Value) -> Value {
        self.alloc(Object::Variant {
            tag: tag.into(),
            payload,
        })
    }

    pub fn reference(&mut self, target: Value) -> Value {
        self.alloc(Object::Ref { target })
    }

    pub fn get(&self, id: ObjId) -> Option<&Object> {
        self.objects.get(id.0)
    }

    pub fn get_mut(&mut self, id: ObjId) -> Option<&mut Object> {
        self.objects.get_mut(id.0)
    }

    /// 参照セルの中身を差し替え、以前の値を返す。参照セルでなければ `None`。
    pub fn set_ref_target(&mut self, id: ObjId, value: Value) -> Option<Value> {
        match self.get_mut(id)? {
            Object::Ref { target } => Some(std::mem::replace(target, value)),
            _ => None,
        }
    }

    /// レコードのフィールドを書き換える (無ければ末尾に追加する)。
    pub fn set_field(&mut self, id: ObjId, name: &str, value: Value) -> bool {
        let Some(Object::Record { fields }) = self.get_mut(id) else {
            return false;
        };
        match fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = value,
            None => fields.push((name.to_string(), value)),
        }
        true
    }

    /// バリアントのペイロードを差し替える。
    pub fn set_payload(&mut self, id: ObjId, value: Value) -> bool {
        match self.get_mut(id) {
            Some(Object::Variant { payload, .. }) => {
                *payload = value;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("objects", &self.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Heap, Object, Value};

    #[test]
    /// 参照セルの差し替えが以前の値を返すことを確認する。
    fn set_ref_target_returns_previous() {
        let mut heap = Heap::new();
        let r = heap.reference(Value::Float(1.0));
        let id = r.as_obj().unwrap();
        assert_eq!(heap.set_ref_target(id, r.clone()), Some(Value::Float(1.0)));
        assert_eq!(heap.get(id), Some(&Object::Ref { target: r }));
    }

    #[test]
    /// 参照セル以外への差し替えは拒否される。
    fn set_ref_target_rejects_non_ref() {
        let mut heap = Heap::new();
        let rec = heap.record(vec![]);
        assert_eq!(heap.set_ref_target(rec.as_obj().unwrap(), Value::Null), None);
    }

    #[test]
    /// 既存フィールドは位置を保ったまま上書きされ、新規フィールドは末尾に並ぶ。
    fn set_field_preserves_order() {
        let mut heap = Heap::new();
        let rec = heap.record(vec![
            ("a".into(), Value::Float(1.0)),
            ("b".into(), Value::Float(2.0)),
        ]);
        let id = rec.as_obj().unwrap();
        assert!(heap.set_field(id, "a", Value::Null));
        assert!(heap.set_field(id, "c", Value::Undefined));
        let Some(Object::Record { fields }) = heap.get(id) else {
            panic!("record expected");
        };
        let names: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(fields[0].1, Value::Null);
    }

    #[test]
    /// 分類名が値の形に対応する。
    fn kind_names() {
        let mut heap = Heap::new();
        let v = heap.variant("Foo", Value::Null);
        assert_eq!(v.kind_name(&heap), "variant");
        assert_eq!(Value::str("x").kind_name(&heap), "string");
        assert!(v.is_composite());
        assert!(!Value::Null.is_composite());
    }
}
