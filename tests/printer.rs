// パス: tests/printer.rs
// 役割: ヒープ上に直接組み立てた値の表示を確認する統合テスト
// 意図: 循環・共有・深い入れ子でも表示が停止し、書式が安定していることを保証する
// 関連ファイル: src/repl/printer.rs, src/runtime/value.rs
use cubiml::repl::{print_value, ValuePrinter};
use cubiml::runtime::{Heap, ObjId, Value};

#[test]
/// 自分自身を指す参照セルは 2 回目の出現で打ち切る。
fn self_referencing_ref_cell() {
    let mut heap = Heap::new();
    let cell = heap.reference(Value::Null);
    let id = cell.as_obj().unwrap();
    heap.set_ref_target(id, cell.clone());
    assert_eq!(print_value(&heap, &cell), "ref ...");
}

#[test]
/// レコードとバリアントを経由する循環。
fn cycle_through_record_and_variant() {
    let mut heap = Heap::new();
    let node = heap.record(vec![("next".into(), Value::Null)]);
    let wrapped = heap.variant("Link", node.clone());
    heap.set_field(node.as_obj().unwrap(), "next", wrapped);
    assert_eq!(print_value(&heap, &node), "{next=Link...}");
}

#[test]
/// プリミティブの表示。
fn primitives() {
    let heap = Heap::new();
    let cases = [
        (Value::Bool(true), "true"),
        (Value::Int(42), "42"),
        (Value::Float(-0.0), "-0.0"),
        (Value::Float(1e21), "1e+21"),
        (Value::Float(2.5e-7), "2.5e-7"),
        (Value::Float(1e-6), "0.000001"),
        (Value::str("é\u{1}"), "\"é\\u0001\""),
        (Value::Null, "null"),
        (Value::Undefined, "<undefined>"),
    ];
    for (value, expected) in cases {
        assert_eq!(print_value(&heap, &value), expected);
    }
}

#[test]
/// ヒープに存在しない ID は未定義値として表示する。
fn dangling_object_id() {
    let heap = Heap::new();
    assert_eq!(print_value(&heap, &Value::Obj(ObjId(99))), "<undefined>");
}

#[test]
/// 訪問済み集合は 1 回の表示ごとに作り直される。
fn printers_do_not_share_state() {
    let mut heap = Heap::new();
    let inner = heap.record(vec![]);
    let outer = heap.variant("Box", inner.clone());
    assert_eq!(ValuePrinter::new(&heap).print(&outer), "Box{}");
    assert_eq!(ValuePrinter::new(&heap).print(&inner), "{}");
    assert_eq!(ValuePrinter::new(&heap).print(&outer), "Box{}");
}

#[test]
/// 非常に長いリスト状の値でもスタックを使い切らない。
fn long_chain_of_variants() {
    let mut heap = Heap::new();
    let mut value = heap.record(vec![]);
    for i in 0..50_000 {
        let tag = if i % 2 == 0 { "0" } else { "1" };
        value = heap.variant(tag, value);
    }
    let printed = print_value(&heap, &value);
    assert_eq!(printed.len(), 50_000 + 2);
    assert!(printed.starts_with("10"));
    assert!(printed.ends_with("10{}"));
}
