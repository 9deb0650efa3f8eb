// パス: src/repl/history.rs
// 役割: 投入済みコマンドの履歴と閲覧カーソルを保持する
// 意図: 重複抑止・カーソルのクランプ・永続化を一箇所で扱う
// 関連ファイル: src/repl/driver.rs, src/repl/line_editor.rs, src/repl/config.rs
//! コマンド履歴
//!
//! - 直前のエントリと同じ入力は追加しない。
//! - 閲覧カーソル `offset` は `None` が「閲覧していない」を表し、`Some(0)` が最新のエントリ。
//! - `older`/`newer` は範囲外へ出ず端で止まる (巻き戻りはしない)。
//! - ファイルへは 1 行 1 エントリで、各行を JSON 文字列として書き出す。

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// 履歴件数の既定上限。
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// 履歴ファイルの場所を上書きする環境変数。
pub const HISTORY_ENV: &str = "CUBIML_HISTORY_FILE";

#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: Vec<String>,
    offset: Option<usize>,
    max_entries: usize,
    path: Option<PathBuf>,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            offset: None,
            max_entries: max_entries.max(1),
            path: None,
        }
    }

    /// 履歴ファイルを読み込む。ファイルが無ければ空の履歴を返す。
    pub fn load(path: impl Into<PathBuf>, max_entries: usize) -> io::Result<Self> {
        let path = path.into();
        let mut log = Self::with_max_entries(max_entries);
        match fs::read_to_string(&path) {
            Ok(content) => {
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    let entry = serde_json::from_str::<String>(line)
                        .unwrap_or_else(|_| line.to_string());
                    log.push_entry(&entry);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        log.path = Some(path);
        Ok(log)
    }

    /// 結び付けられたファイルへ全エントリを書き出す。ファイル未指定なら何もしない。
    pub fn save(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        for entry in &self.entries {
            let encoded = serde_json::to_string(entry).map_err(io::Error::from)?;
            writeln!(file, "{}", encoded)?;
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 入力を記録して閲覧カーソルを解除する。追加された場合は `true`。
    pub fn record(&mut self, entry: &str) -> bool {
        self.offset = None;
        self.push_entry(entry)
    }

    /// 直前と同じエントリは積まない。読み込み時もこの規則に従う。
    fn push_entry(&mut self, entry: &str) -> bool {
        if self.entries.last().map(String::as_str) == Some(entry) {
            return false;
        }
        if self.entries.len() >= self.max_entries {
            self.entries.remove(0);
        }
        self.entries.push(entry.to_string());
        true
    }

    /// 1 つ古いエントリへ移動する。
    pub fn older(&mut self) -> Option<&str> {
        let next = self.offset.map_or(0, |n| n + 1);
        self.move_to(next)
    }

    /// 1 つ新しいエントリへ移動する。最新より先へは進まない。
    pub fn newer(&mut self) -> Option<&str> {
        let next = self.offset.map_or(0, |n| n.saturating_sub(1));
        self.move_to(next)
    }

    fn move_to(&mut self, offset: usize) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let offset = offset.min(self.entries.len() - 1);
        self.offset = Some(offset);
        self.selected()
    }

    /// カーソルが指しているエントリ (`len - offset - 1` 番目)。
    pub fn selected(&self) -> Option<&str> {
        let offset = self.offset?;
        let idx = self.entries.len().checked_sub(offset + 1)?;
        self.entries.get(idx).map(String::as_str)
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn reset_cursor(&mut self) {
        self.offset = None;
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 履歴ファイルの既定パスを決める。設定値、環境変数、ホームディレクトリの順に参照する。
pub fn resolve_history_path(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env::var_os(HISTORY_ENV) {
        return Some(PathBuf::from(path));
    }
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .map(|home| home.join(".cubiml_repl_history"))
}

#[cfg(test)]
mod tests {
    use super::{resolve_history_path, HistoryLog, HISTORY_ENV};
    use std::env;
    use std::path::Path;
    use std::sync::{Mutex, OnceLock};

    fn log_with(entries: &[&str]) -> HistoryLog {
        let mut log = HistoryLog::new();
        for e in entries {
            log.record(e);
        }
        log
    }

    #[test]
    /// 連続する同一入力は 1 件だけ記録される。
    fn record_deduplicates_consecutive_entries() {
        let log = log_with(&["a", "a", "b", "a"]);
        assert_eq!(log.entries(), &["a", "b", "a"]);
    }

    #[test]
    /// 古い方向へ行き過ぎても最古のエントリで止まる。
    fn older_clamps_at_oldest() {
        let mut log = log_with(&["a", "b", "c"]);
        assert_eq!(log.older(), Some("c"));
        assert_eq!(log.older(), Some("b"));
        assert_eq!(log.older(), Some("a"));
        assert_eq!(log.older(), Some("a"));
        assert_eq!(log.offset(), Some(2));
    }

    #[test]
    /// 新しい方向は 0 で止まり、閲覧前の newer は最新を選ぶ。
    fn newer_clamps_at_latest() {
        let mut log = log_with(&["a", "b"]);
        assert_eq!(log.newer(), Some("b"));
        assert_eq!(log.offset(), Some(0));
        log.older();
        assert_eq!(log.newer(), Some("b"));
        assert_eq!(log.newer(), Some("b"));
        assert_eq!(log.offset(), Some(0));
    }

    #[test]
    /// 空の履歴では移動しても何も選ばれない。
    fn navigation_on_empty_log_is_noop() {
        let mut log = HistoryLog::new();
        assert_eq!(log.older(), None);
        assert_eq!(log.newer(), None);
        assert_eq!(log.offset(), None);
    }

    #[test]
    /// 記録すると閲覧カーソルが解除される (重複で追加されなくても)。
    fn record_resets_cursor() {
        let mut log = log_with(&["a", "b"]);
        log.older();
        log.older();
        assert!(!log.record("b"));
        assert_eq!(log.offset(), None);
    }

    #[test]
    /// 上限を超えると最古のエントリから捨てられる。
    fn max_entries_drops_oldest() {
        let mut log = HistoryLog::with_max_entries(2);
        log.record("1");
        log.record("2");
        log.record("3");
        assert_eq!(log.entries(), &["2", "3"]);
    }

    #[test]
    /// 改行を含むエントリも保存・再読込で 1 件のまま保たれる。
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history");
        let mut log = HistoryLog::load(&path, 10).unwrap();
        assert!(log.is_empty());
        log.record("let x = 1");
        log.record("match x with\n| y -> y");
        log.save().unwrap();

        let loaded = HistoryLog::load(&path, 10).unwrap();
        assert_eq!(loaded.entries(), log.entries());
        assert_eq!(loaded.path(), Some(path.as_path()));
    }

    #[test]
    /// JSON でない行はそのまま 1 エントリとして読み込む。
    fn load_accepts_plain_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        std::fs::write(&path, "1 + 1\n\n\"a\\tb\"\n").unwrap();
        let loaded = HistoryLog::load(&path, 10).unwrap();
        assert_eq!(loaded.entries(), &["1 + 1", "a\tb"]);
    }

    #[test]
    /// ファイル内で連続する同じ行は 1 件にまとめて読み込む。
    fn load_collapses_consecutive_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        std::fs::write(&path, "\"a\"\n\"a\"\na\n\"b\"\n\"a\"\n").unwrap();
        let mut loaded = HistoryLog::load(&path, 10).unwrap();
        assert_eq!(loaded.entries(), &["a", "b", "a"]);
        assert!(!loaded.record("a"));
    }

    fn with_env_lock<T>(f: impl FnOnce() -> T) -> T {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        let lock = GUARD.get_or_init(|| Mutex::new(()));
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        f()
    }

    #[test]
    /// 設定値が環境変数より優先され、無ければ環境変数が使われる。
    fn history_path_resolution_order() {
        with_env_lock(|| {
            env::set_var(HISTORY_ENV, "/tmp/cubiml_env_history");
            let configured = resolve_history_path(Some(Path::new("/tmp/configured")));
            assert_eq!(configured.as_deref(), Some(Path::new("/tmp/configured")));
            let from_env = resolve_history_path(None);
            assert_eq!(from_env.as_deref(), Some(Path::new("/tmp/cubiml_env_history")));
            env::remove_var(HISTORY_ENV);
        });
    }
}
