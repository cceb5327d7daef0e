//! This module contains the main entrypoint to the ic50 cli.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use ic50_core::{
	pipeline,
	runner::{rank_results, ResultRow},
	Config,
};
use ic50_util::table::Table;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[clap(
	about = "Compare categorical encoding strategies for drug sensitivity prediction.",
	disable_help_subcommand = true
)]
struct Options {
	#[clap(short, long, global = true, help = "log debug messages")]
	verbose: bool,
	#[clap(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	#[clap(name = "split", about = "split the dataset into training and test rows")]
	Split(DataOptions),
	#[clap(
		name = "encode",
		about = "encode the split with every configured strategy"
	)]
	Encode(DataOptions),
	#[clap(name = "run", about = "fit and score every configured model")]
	Run(OutputOptions),
	#[clap(name = "all", about = "run the split, encode, and run steps in order")]
	All(DataOptions),
}

#[derive(Args, Debug)]
struct DataOptions {
	#[clap(short, long, help = "the path to the config file")]
	config: PathBuf,
	#[clap(short, long, help = "the path to the cleaned dataset .csv file")]
	data: PathBuf,
	#[clap(short, long, default_value = "out", help = "the directory to write artifacts to")]
	out: PathBuf,
}

#[derive(Args, Debug)]
struct OutputOptions {
	#[clap(short, long, help = "the path to the config file")]
	config: PathBuf,
	#[clap(short, long, default_value = "out", help = "the directory holding the artifacts")]
	out: PathBuf,
}

fn main() {
	let options = Options::parse();
	let result = init_tracing(options.verbose).and_then(|_| match options.command {
		Command::Split(options) => cli_split(options),
		Command::Encode(options) => cli_encode(options),
		Command::Run(options) => cli_run(options),
		Command::All(options) => cli_all(options),
	});
	if let Err(error) = result {
		eprintln!("{}: {:#}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn init_tracing(verbose: bool) -> Result<()> {
	let level = if verbose { Level::DEBUG } else { Level::INFO };
	let subscriber = FmtSubscriber::builder()
		.with_max_level(level)
		.with_target(false)
		.with_writer(std::io::stderr)
		.finish();
	tracing::subscriber::set_global_default(subscriber)
		.context("failed to set the tracing subscriber")
}

fn load_config(path: &std::path::Path) -> Result<Config> {
	Ok(Config::from_path(path)?)
}

fn cli_split(options: DataOptions) -> Result<()> {
	let config = load_config(&options.config)?;
	let record = pipeline::run_split_step(&config, &options.data, &options.out)?;
	eprintln!(
		"Split {} rows into {} training and {} test rows with seed {}.",
		record.n_rows, record.n_train, record.n_test, record.seed
	);
	Ok(())
}

fn cli_encode(options: DataOptions) -> Result<()> {
	let config = load_config(&options.config)?;
	let strategies = pipeline::run_encode_step(&config, &options.data, &options.out)?;
	for strategy in strategies {
		eprintln!(
			"Wrote {}.",
			pipeline::Artifacts::new(&options.out)
				.encoded_dir(strategy)
				.display()
		);
	}
	Ok(())
}

fn cli_run(options: OutputOptions) -> Result<()> {
	let config = load_config(&options.config)?;
	let rows = pipeline::run_models_step(&config, &options.out)?;
	print_results(&rows);
	Ok(())
}

fn cli_all(options: DataOptions) -> Result<()> {
	let config = load_config(&options.config)?;
	let rows = pipeline::run_all(&config, &options.data, &options.out)?;
	print_results(&rows);
	Ok(())
}

fn print_results(rows: &[ResultRow]) {
	let format = |value: Option<f64>| value.map(|value| format!("{:.4}", value)).unwrap_or_default();
	let mut table = Table::new(vec![
		"rank", "strategy", "model", "rmse", "mae", "r2", "pearson_r", "seconds", "error",
	]);
	for (rank, row) in rank_results(rows).iter().enumerate() {
		table.push_row(vec![
			(rank + 1).to_string(),
			row.strategy.to_string(),
			row.model.to_string(),
			format(row.rmse),
			format(row.mae),
			format(row.r2),
			format(row.pearson_r),
			format!("{:.2}", row.elapsed_seconds),
			row.error.clone().unwrap_or_default(),
		]);
	}
	println!("{}", table);
}
