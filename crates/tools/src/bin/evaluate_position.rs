use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use rothello_core::types::{MAX_SCORE, MIN_SCORE};
use rothello_core::{DriverState, Position, Score, SearchDriver, SearchParams, SearchReport};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(author, version, about = "局面を確率的グラフ探索で評価する")]
struct Cli {
    /// 64文字の盤面（X: 手番側, O: 相手側, -: 空き）。省略時は初期局面
    #[arg(long)]
    position: Option<String>,

    /// 探索パラメータの TOML ファイル
    #[arg(long)]
    params: Option<PathBuf>,

    /// ワーカースレッド数（TOML の値を上書き）
    #[arg(long)]
    threads: Option<usize>,

    /// 局面グラフのノード数上限（TOML の値を上書き）
    #[arg(long)]
    max_graph_nodes: Option<usize>,

    /// 置換表サイズ MB（TOML の値を上書き）
    #[arg(long)]
    tt_mb: Option<usize>,

    /// 訪問ノード数の上限
    #[arg(long, default_value_t = 10_000_000)]
    max_visited: u64,

    /// 探索時間の上限（ミリ秒）
    #[arg(long, default_value_t = 10_000)]
    time_ms: u64,

    /// 窓の下限（石差 ×100）
    #[arg(long, default_value_t = MIN_SCORE, allow_hyphen_values = true)]
    lower: Score,

    /// 窓の上限（石差 ×100）
    #[arg(long, default_value_t = MAX_SCORE, allow_hyphen_values = true)]
    upper: Score,

    /// 結果を JSON で出力
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    position: String,
    report: &'a SearchReport,
}

fn load_params(cli: &Cli) -> Result<SearchParams> {
    let mut params = match &cli.params {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => SearchParams::default(),
    };
    if let Some(threads) = cli.threads {
        params.threads = threads;
    }
    if let Some(nodes) = cli.max_graph_nodes {
        params.max_graph_nodes = nodes;
    }
    if let Some(mb) = cli.tt_mb {
        params.tt_size_mb = mb;
    }
    Ok(params)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    let cli = Cli::parse();

    if cli.lower > cli.upper {
        bail!("lower {} exceeds upper {}", cli.lower, cli.upper);
    }
    let position = match &cli.position {
        Some(text) => Position::from_text(text).context("invalid --position")?,
        None => Position::initial(),
    };
    let params = load_params(&cli)?;
    info!("params: {params:?}");

    let mut driver = SearchDriver::new(params);
    let report = driver.evaluate_position(
        position,
        cli.lower,
        cli.upper,
        cli.max_visited,
        Duration::from_millis(cli.time_ms),
    );
    if report.state == DriverState::Failed {
        let reason = driver.failure().map_or_else(|| "unknown".to_string(), ToString::to_string);
        bail!("search failed: {reason}");
    }

    if cli.json {
        let output = Output { position: position.to_string(), report: &report };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", position.to_board_string());
        println!("state      {:?}", report.state);
        println!("best move  {} ({:?})", report.best_move, report.best_move_score);
        println!("estimate   {:+.2}", f64::from(report.estimate) / 100.0);
        println!("bounds     {}..={}", report.lower, report.upper);
        println!("weak       {}..={}", report.weak_lower, report.weak_upper);
        println!("visited    {} in {} ms", report.visited, report.elapsed_ms);
        println!("graph      {} nodes, {} leaves issued", report.graph_nodes, report.descendants);
        println!("tt fill    {:.1}%", report.tt_fill * 100.0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_params() {
        let cli = Cli::parse_from(["evaluate_position", "--threads", "3", "--tt-mb", "8", "--lower", "-400"]);
        let params = load_params(&cli).unwrap();
        assert_eq!(params.threads, 3);
        assert_eq!(params.tt_size_mb, 8);
        assert_eq!(params.max_graph_nodes, SearchParams::default().max_graph_nodes);
        assert_eq!(cli.lower, -400);
        assert_eq!(cli.upper, MAX_SCORE);
    }

    #[test]
    fn missing_params_file_is_an_error() {
        let cli = Cli::parse_from(["evaluate_position", "--params", "/nonexistent/params.toml"]);
        assert!(load_params(&cli).is_err());
    }
}
