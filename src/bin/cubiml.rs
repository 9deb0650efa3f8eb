// パス: src/bin/cubiml.rs
// 役割: REPL を起動するバイナリのエントリポイント
// 意図: 設定ファイルとコマンドライン引数を合成して端末 REPL を動かす
// 関連ファイル: src/repl/cmd.rs, src/repl/config.rs, src/lib.rs
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cubiml::repl::{run_repl, ReplConfig, StartupOptions};

#[derive(Parser)]
#[command(name = "cubiml-repl")]
#[command(about = "cubiml の対話環境 (コンパイル → 評価 → 表示)")]
struct Cli {
    /// JSON 形式の設定ファイル
    #[arg(long)]
    config: Option<PathBuf>,

    /// 対話開始前にファイル全体を実行する
    #[arg(long)]
    run: Option<PathBuf>,

    /// --run の実行後に終了する
    #[arg(long, requires = "run")]
    batch: bool,

    /// 履歴ファイルの場所
    #[arg(long)]
    history_file: Option<PathBuf>,

    /// 履歴を読み書きしない
    #[arg(long)]
    no_history: bool,

    /// エラー行の着色と画面消去を無効にする
    #[arg(long)]
    no_color: bool,

    /// 入力行を出力へエコーする
    #[arg(long)]
    echo: bool,
}

impl Cli {
    fn apply(&self, config: &mut ReplConfig) {
        if let Some(path) = &self.history_file {
            config.history_file = Some(path.clone());
        }
        if self.no_history {
            config.persist_history = false;
        }
        if self.no_color {
            config.color = false;
        }
        if self.echo {
            config.echo_input = true;
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => match ReplConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::from(2);
            }
        },
        None => ReplConfig::default(),
    };
    cli.apply(&mut config);

    let startup = StartupOptions {
        run: cli.run.as_deref(),
        batch: cli.batch,
    };
    match run_repl(&config, startup) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) if cli.batch => ExitCode::FAILURE,
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("入出力エラー: {}", e);
            ExitCode::FAILURE
        }
    }
}
