// パス: src/repl/config.rs
// 役割: REPL の設定値を JSON ファイルから読み込む
// 意図: プロンプトや履歴・色などの挙動を起動時に切り替えられるようにする
// 関連ファイル: src/bin/cubiml.rs, src/repl/cmd.rs, src/repl/history.rs

use crate::runtime::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::history::DEFAULT_MAX_ENTRIES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("設定ファイルを読み込めません: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("設定ファイルの形式が不正です: {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 全フィールドに既定値を持つ REPL 設定。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplConfig {
    pub prompt: String,
    pub continuation_prompt: String,
    pub echo_input: bool,
    pub color: bool,
    pub history_file: Option<PathBuf>,
    pub persist_history: bool,
    pub max_history: usize,
    pub max_eval_depth: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: ">> ".to_string(),
            continuation_prompt: ".. ".to_string(),
            echo_input: false,
            color: true,
            history_file: None,
            persist_history: true,
            max_history: DEFAULT_MAX_ENTRIES,
            max_eval_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ReplConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
