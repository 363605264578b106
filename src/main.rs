use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use esbulk::app::{self, RunOptions, RunReport};
use esbulk::config::BulkConfig;
use esbulk::elastic::{ElasticClient, ElasticConfig};
use esbulk::error::AppError;
use esbulk::reader::DecodePolicy;
use esbulk::record::WriteOp;
use esbulk::shutdown::spawn_signal_listener;

#[derive(Parser, Debug)]
#[command(
    name = "esbulk",
    about = "Stream line-delimited JSON records into an Elasticsearch index"
)]
struct Args {
    /// Elasticsearch endpoint [default: $ELASTICSEARCH_URL or http://127.0.0.1:9200].
    #[arg(long)]
    url: Option<String>,

    /// Target index; dropped and recreated on start [default: records].
    #[arg(long)]
    index: Option<String>,

    /// Number of bulk workers (0 uses BULK_WORKERS, default 1).
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// NDJSON input file or directory; repeatable. `.gz` files are
    /// decompressed on the fly. Several files are ingested concurrently,
    /// each into the index named after it.
    #[arg(long = "input", default_value = "data/records.ndjson")]
    inputs: Vec<PathBuf>,

    /// Files ingested at the same time when there are several inputs.
    #[arg(long, default_value_t = 4)]
    parallel: usize,

    /// JSON file with index settings and mappings used at creation.
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Bulk action per record (`index` or `update`).
    #[arg(long, default_value = "index")]
    op: WriteOp,

    /// What to do with a line that is not a valid record (`fail` or `skip`).
    #[arg(long, default_value = "fail")]
    on_invalid: DecodePolicy,

    /// Skip records whose `decide_date` is empty.
    #[arg(long)]
    require_decide_date: bool,

    /// Use the input file name (up to the first dot) as the index name.
    #[arg(long)]
    index_from_filename: bool,

    /// Refresh each index after its last commit.
    #[arg(long)]
    refresh: bool,

    /// Commit after this many buffered requests per worker.
    #[arg(long)]
    bulk_actions: Option<usize>,

    /// Commit once a worker's buffered body reaches this many bytes.
    #[arg(long)]
    bulk_size: Option<usize>,

    /// Periodic flush interval in milliseconds (0 disables).
    #[arg(long)]
    flush_interval_ms: Option<u64>,

    /// Do not print the per-second statistics line.
    #[arg(long)]
    quiet: bool,
}

/// What the parsed arguments ask for.
enum Plan {
    Single(RunOptions),
    PerFile {
        inputs: Vec<PathBuf>,
        template: RunOptions,
        parallel: usize,
    },
}

impl Args {
    fn into_plan(self) -> Result<Plan, AppError> {
        let inputs = app::collect_inputs(&self.inputs)?;
        let per_file = self.index_from_filename || inputs.len() > 1;
        if per_file && self.index.is_some() {
            return Err(AppError::Usage(
                "--index cannot be combined with several inputs or --index-from-filename".into(),
            ));
        }

        let mut bulk = BulkConfig::from_env();
        if let Some(actions) = self.bulk_actions {
            bulk.bulk_actions = actions.max(1);
        }
        if let Some(size) = self.bulk_size {
            bulk.bulk_size = size.max(1);
        }
        if let Some(millis) = self.flush_interval_ms {
            bulk.flush_interval =
                (millis > 0).then(|| std::time::Duration::from_millis(millis));
        }

        let mut options = RunOptions::new(
            inputs[0].clone(),
            self.index.unwrap_or_else(|| "records".to_string()),
        );
        options.mapping = self.mapping;
        options.op = self.op;
        options.decode_policy = self.on_invalid;
        options.require_decide_date = self.require_decide_date;
        options.workers = self.workers;
        options.print_stats = !self.quiet;
        options.refresh = self.refresh;
        options.bulk = bulk;

        Ok(if per_file {
            Plan::PerFile {
                inputs,
                template: options,
                parallel: self.parallel,
            }
        } else {
            Plan::Single(options)
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    esbulk::init_logger();

    let args = Args::parse();
    let url = args.url.clone();

    let plan = match args.into_plan() {
        Ok(plan) => plan,
        Err(err) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut config = ElasticConfig::from_env();
    if let Some(url) = url {
        config = config.with_url(url);
    }

    let client = match ElasticClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            log::error!("failed to create elasticsearch client: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = client.ping().await {
        log::error!("elasticsearch is not reachable: {}", err);
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    let signals = spawn_signal_listener(cancel.clone());

    let succeeded = match plan {
        Plan::Single(options) => {
            log::info!(
                "indexing {} into '{}' at {}",
                options.input.display(),
                options.index,
                client.base_url()
            );
            let input = options.input.clone();
            report_outcome(&input, app::run(client, options, cancel.clone()).await)
        }
        Plan::PerFile {
            inputs,
            template,
            parallel,
        } => match app::run_all(client, inputs, template, parallel, cancel.clone()).await {
            Ok(outcomes) => outcomes
                .into_iter()
                .map(|outcome| report_outcome(&outcome.input, outcome.result))
                .fold(true, |all, ok| all && ok),
            Err(err) => {
                log::error!("{}", err);
                false
            }
        },
    };

    cancel.cancel();
    if signals.await.unwrap_or(false) {
        log::info!("stopped by signal");
    }

    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn report_outcome(input: &Path, result: Result<RunReport, AppError>) -> bool {
    match result {
        Ok(report) => {
            if report.interrupted() {
                log::info!("{}: interrupted", input.display());
            }
            true
        }
        Err(err) => {
            log::error!("{}: {}", input.display(), err);
            false
        }
    }
}
