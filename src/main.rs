// src/main.rs
use clap::Parser;
use crossbeam_channel::Sender;
use juno_miner_rs::miner::{
    RustRandomX, Scheduler, SessionState, Solution, SysfsTopology, TopologyProvider,
};
use juno_miner_rs::network::{NodeClient, SubmitOutcome};
use juno_miner_rs::stats::{
    BlockResult, HashSample, StatsReporter, SystemResources, format_hashrate,
};
use juno_miner_rs::template::epoch::epoch_number;
use juno_miner_rs::template::target::target_to_hex;
use juno_miner_rs::template::{BlockTemplate, seed_height, serialize_block};
use juno_miner_rs::utils::digest::to_display_hex;
use juno_miner_rs::utils::logging::{init_bench_logging, parse_level};
use juno_miner_rs::{Config, MinerError, MiningMode, cli, config, init_logging};
use log::LevelFilter;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

/// How often the mining loop looks at the workers
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Wait before asking an unreachable node again
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Consecutive failed tip checks before mining is stopped
const MAX_RPC_FAILURES: u32 = 2;

/// How often network difficulty and hashrate are fetched
const MINING_INFO_INTERVAL: Duration = Duration::from_secs(10);

/// Seed used by the benchmark
const BENCH_SEED: [u8; 32] = [0u8; 32];

type Miner = Scheduler<RustRandomX>;

/// Main entry point for the Juno miner
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Starts solo mining against the configured node
///
/// # Operations
/// 1. Loads configuration and applies CLI overrides
/// 2. Initializes logging
/// 3. Sizes the thread pool from CPUs and memory
/// 4. Runs the node-driven mining loop until Ctrl-C
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    let (config, from_file) = load_config(&opts)?;

    let level = if opts.debug {
        LevelFilter::Debug
    } else {
        parse_level(&config.log_level)
    };
    init_logging(level, config.log_file.as_deref())?;
    log::info!("=== Juno Miner starting ===");
    if from_file {
        log::info!("Loaded configuration from {}", opts.config.display());
    }

    let resources = SystemResources::detect();
    log::info!(
        "System: {} CPUs, {} MB RAM ({} MB available)",
        resources.cpu_count,
        resources.total_memory_mb,
        resources.available_memory_mb
    );

    let mode = select_mode(&config, &resources);
    let threads = select_threads(&config, &resources, mode);
    log::info!("Mode: {} | Threads: {}", mode, threads);

    let rt = Runtime::new()?;
    rt.block_on(run_miner(config, mode, threads))
}

/// Reads the config file if present and applies CLI overrides
fn load_config(opts: &cli::StartOptions) -> Result<(Config, bool), MinerError> {
    let from_file = opts.config.exists();
    let mut config = if from_file {
        config::load(&opts.config)?
    } else {
        Config::default()
    };

    if let Some(url) = &opts.rpc_url {
        config.node.rpc_url = url.clone();
    }
    if let Some(user) = &opts.rpc_user {
        config.node.rpc_user = user.clone();
    }
    if let Some(password) = &opts.rpc_password {
        config.node.rpc_password = password.clone();
    }
    if let Some(threads) = opts.threads {
        config.threads = threads;
    }
    if opts.fast {
        config.fast_mode = true;
    }
    if let Some(secs) = opts.update_interval {
        config.update_interval_secs = secs;
    }
    if let Some(secs) = opts.block_check_interval {
        config.block_check_interval_secs = secs;
    }
    if opts.log_file.is_some() {
        config.log_file = opts.log_file.clone();
    }

    config.validate()?;
    Ok((config, from_file))
}

/// Falls back to light mode when the dataset does not fit
fn select_mode(config: &Config, resources: &SystemResources) -> MiningMode {
    let mode = config.mode();
    if mode.is_fast() && resources.optimal_threads(true) == 0 {
        log::warn!("Insufficient RAM for fast mode (need ~2.5 GB), falling back to light mode");
        return MiningMode::Light;
    }
    mode
}

/// Configured thread count, or the optimum for `mode` when set to 0
fn select_threads(config: &Config, resources: &SystemResources, mode: MiningMode) -> usize {
    let threads = if config.threads == 0 {
        resources.optimal_threads(mode.is_fast()).max(1)
    } else {
        config.threads
    };
    if threads > resources.cpu_count {
        log::warn!(
            "Requested {} threads, but only {} CPUs available",
            threads,
            resources.cpu_count
        );
    }
    threads
}

/// Runs a blocking scheduler call off the async runtime
async fn blocking<T, F>(f: F) -> Result<T, MinerError>
where
    F: FnOnce() -> Result<T, MinerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Stops the workers and waits for them
async fn halt(miner: &Arc<Miner>) {
    let miner = Arc::clone(miner);
    if let Err(e) = blocking(move || {
        miner.stop();
        Ok(())
    })
    .await
    {
        log::error!("Failed to stop mining threads: {}", e);
    }
}

/// Why a mining session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Workers stopped on their own (a solution was claimed)
    Solved,
    /// The network moved past the template
    NewBlock,
    /// The node stopped answering
    Disconnected,
    /// Ctrl-C
    Shutdown,
}

/// The node-driven mining loop
async fn run_miner(config: Config, mode: MiningMode, threads: usize) -> Result<(), MinerError> {
    let node = NodeClient::new(config.node.clone())?;

    log::info!("Testing RPC connection to {}", node.url());
    let info = node.get_blockchain_info().await.map_err(|e| {
        log::error!("Failed to connect to RPC server, check URL and credentials");
        e
    })?;
    log::info!("Connected to {} at block {}", info.chain, info.blocks);

    let initial = node.get_block_template().await?;
    log::debug!(
        "Initial template: height={} seed_height={}",
        initial.height,
        initial.seed_height
    );

    let topology = SysfsTopology::new().detect();
    let miner = Arc::new(Scheduler::new(
        Arc::new(RustRandomX::new()),
        topology,
        mode,
        threads,
    )?);
    {
        let miner = Arc::clone(&miner);
        let seed = initial.seed_hash;
        blocking(move || miner.initialize(&seed)).await?;
    }
    log::info!("Miner initialized");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Shutdown requested");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let reporter = StatsReporter::new(Duration::from_secs(config.update_interval_secs));
    let results = reporter.result_sender();
    {
        let miner = Arc::clone(&miner);
        reporter.start_reporting(move || HashSample {
            hashes: miner.hash_count(),
            hashrate: miner.hashrate(),
        });
    }

    let started = Instant::now();
    let mut total_hashes = 0u64;
    let mut blocks_accepted = 0u64;
    let mut blocks_rejected = 0u64;
    let mut current_seed = initial.seed_hash;
    let mut next_template = Some(initial);
    let mut disconnected = false;

    while !shutdown.load(Ordering::SeqCst) {
        let template = match next_template.take() {
            Some(t) => t,
            None => match node.get_block_template().await {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("Failed to get block template: {}", e);
                    disconnected = true;
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            },
        };

        if disconnected {
            log::info!("RPC connection restored, resuming mining");
            disconnected = false;
        }

        if template.seed_hash != current_seed {
            let height = u64::from(template.height);
            log::info!(
                "Epoch transition: seed height {} -> {} (epoch {})",
                seed_height(height.saturating_sub(1)),
                seed_height(height),
                epoch_number(height)
            );
            log::debug!("Old seed: {}", hex::encode(current_seed));
            log::debug!("New seed: {}", hex::encode(template.seed_hash));

            let miner = Arc::clone(&miner);
            let seed = template.seed_hash;
            blocking(move || miner.update_seed(&seed)).await?;
            current_seed = seed;
            log::info!("Epoch transition complete");
        }

        log::debug!(
            "Template: height={} bits={:08x} target={} txs={}",
            template.height,
            template.bits,
            target_to_hex(&template.target),
            template.txn_hex.len()
        );
        let template = Arc::new(template);
        {
            let miner = Arc::clone(&miner);
            let template = Arc::clone(&template);
            blocking(move || miner.start_mining(template)).await?;
        }

        let end = watch_session(&node, &miner, &template, &config, &shutdown).await;
        total_hashes += miner.hash_count();

        match end {
            SessionEnd::Solved | SessionEnd::Shutdown => {
                let solution = {
                    let miner = Arc::clone(&miner);
                    blocking(move || Ok(miner.solution())).await?
                };
                if let Some(solution) = solution {
                    match submit_solution(&node, &solution, &results).await {
                        BlockResult::Accepted => blocks_accepted += 1,
                        BlockResult::Rejected => blocks_rejected += 1,
                    }
                }
            }
            SessionEnd::Disconnected => disconnected = true,
            SessionEnd::NewBlock => {}
        }
    }

    halt(&miner).await;
    reporter.stop();
    drop(results);

    let uptime = started.elapsed().as_secs();
    let average = if uptime > 0 {
        total_hashes as f64 / uptime as f64
    } else {
        0.0
    };
    println!();
    println!("Mining stopped after {}s", uptime);
    println!("  Total hashes:     {}", total_hashes);
    println!("  Average hashrate: {}", format_hashrate(average));
    println!(
        "  Blocks found:     {} ({} accepted, {} rejected)",
        blocks_accepted + blocks_rejected,
        blocks_accepted,
        blocks_rejected
    );
    Ok(())
}

/// Polls a running session until it ends
async fn watch_session(
    node: &NodeClient,
    miner: &Arc<Miner>,
    template: &BlockTemplate,
    config: &Config,
    shutdown: &AtomicBool,
) -> SessionEnd {
    let check_interval = Duration::from_secs(config.block_check_interval_secs);
    let mut last_check = Instant::now();
    let mut last_info: Option<Instant> = None;
    let mut failures = 0u32;

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        if shutdown.load(Ordering::SeqCst) {
            halt(miner).await;
            return SessionEnd::Shutdown;
        }
        if miner.state() != SessionState::Mining {
            return SessionEnd::Solved;
        }

        if last_check.elapsed() >= check_interval {
            last_check = Instant::now();
            match node.get_blockchain_info().await {
                Ok(info) => {
                    failures = 0;
                    if info.blocks >= u64::from(template.height) {
                        log::info!(
                            "New block on network: height {} -> {}",
                            template.height,
                            info.blocks + 1
                        );
                        halt(miner).await;
                        return SessionEnd::NewBlock;
                    }
                }
                Err(e) => {
                    failures += 1;
                    log::warn!("RPC check failed ({}/{}): {}", failures, MAX_RPC_FAILURES, e);
                    if failures >= MAX_RPC_FAILURES {
                        log::warn!("RPC connection lost - stopping mining threads");
                        halt(miner).await;
                        return SessionEnd::Disconnected;
                    }
                }
            }
        }

        if last_info.is_none_or(|t| t.elapsed() >= MINING_INFO_INTERVAL) {
            last_info = Some(Instant::now());
            if let Ok(info) = node.get_mining_info().await {
                log::debug!(
                    "Network: {} | difficulty {:.4}",
                    format_hashrate(info.networksolps),
                    info.difficulty
                );
            }
        }
    }
}

/// Serializes and submits a solved block
async fn submit_solution(
    node: &NodeClient,
    solution: &Solution,
    results: &Sender<BlockResult>,
) -> BlockResult {
    let template = &solution.template;
    let block_hash = to_display_hex(&solution.hash);
    log::info!("Block found at height {}: {}", template.height, block_hash);
    log::debug!("Nonce: {}", hex::encode(solution.nonce));

    let block_hex = match serialize_block(
        &solution.header,
        &solution.hash,
        &template.coinbase_txn_hex,
        &template.txn_hex,
    ) {
        Ok(hex) => hex,
        Err(e) => {
            log::error!("Failed to serialize block {}: {}", block_hash, e);
            let _ = results.send(BlockResult::Rejected);
            return BlockResult::Rejected;
        }
    };

    let result = match node.submit_block(&block_hex).await {
        Ok(outcome) => {
            match &outcome {
                SubmitOutcome::Accepted => log::info!("Block {} accepted", block_hash),
                SubmitOutcome::Duplicate(status) => {
                    log::info!("Block {} stored by node ({})", block_hash, status)
                }
                SubmitOutcome::Rejected(reason) => {
                    log::warn!("Block {} rejected: {}", block_hash, reason)
                }
            }
            BlockResult::from(&outcome)
        }
        Err(e) => {
            log::error!("Failed to submit block {}: {}", block_hash, e);
            BlockResult::Rejected
        }
    };
    let _ = results.send(result);
    result
}

/// Measures the local hashrate on a synthetic, unsolvable template
///
/// # Operations
/// 1. Initializes benchmark-specific logging
/// 2. Builds RandomX resources for a fixed seed
/// 3. Mines for the requested duration
/// 4. Reports total hashes and average hashrate
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let topology = SysfsTopology::new().detect();
    let miner = Scheduler::new(
        Arc::new(RustRandomX::new()),
        topology,
        opts.mode,
        opts.threads,
    )?;

    log::info!(
        "Initializing RandomX for {} mode benchmark with {} threads",
        opts.mode,
        opts.threads
    );
    miner.initialize(&BENCH_SEED)?;

    let template = Arc::new(benchmark_template()?);
    log::info!("Starting benchmark for {} seconds", opts.duration);
    miner.start_mining(template)?;

    let deadline = Instant::now() + Duration::from_secs(opts.duration);
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        std::thread::sleep(remaining.min(Duration::from_secs(1)));
        log::debug!(
            "{} ({} hashes)",
            format_hashrate(miner.hashrate()),
            miner.hash_count()
        );
    }

    let hashes = miner.hash_count();
    let hashrate = miner.hashrate();
    miner.stop();

    log::info!("Benchmark results:");
    log::info!("Total hashes: {}", hashes);
    log::info!("Average hashrate: {}", format_hashrate(hashrate));
    log::info!(
        "Per thread: {}",
        format_hashrate(hashrate / opts.threads.max(1) as f64)
    );
    log::logger().flush();

    Ok(())
}

/// Template with an all-zero target, so no nonce ever solves it
fn benchmark_template() -> Result<BlockTemplate, MinerError> {
    let zero = "00".repeat(32);
    let doc = json!({
        "version": 4,
        "previousblockhash": zero,
        "curtime": 0,
        "bits": "1f09daa8",
        "height": 1,
        "randomxseedheight": 0,
        "randomxseedhash": hex::encode(BENCH_SEED),
        "defaultroots": {
            "merkleroot": zero,
            "blockcommitmentshash": zero
        },
        "coinbasetxn": { "data": "00" },
        "transactions": []
    });
    Ok(BlockTemplate::parse(&doc)?.with_target([0u8; 32]))
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let config = config::generate_template();
    std::fs::write(&opts.output, config)?;
    println!("Configuration template written to {}", opts.output.display());
    Ok(())
}
