use bespin_core::{Blockchain, ChainError, ChainResult, Miner};
use clap::{Args, Parser, Subcommand};
use shared::{Amount, KeyPair};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "bespin")]
#[command(about = "Bespin (BSP) - Bitcoin-style UTXO blockchain node")]
#[command(version = "0.1.0")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mine blocks locally against the chain database
    Mine(MineArgs),
    /// Print aggregate chain information
    Info(InfoArgs),
    /// Audit the chain with a full replay from genesis
    Validate(DbArgs),
    /// Create or derive wallets
    Wallet(WalletArgs),
    /// Create, sign and submit a transaction to the mempool
    Send(SendArgs),
}

#[derive(Args)]
struct DbArgs {
    /// Path to the chain database
    #[arg(long, default_value = "blockchain.db")]
    db: String,

    /// Proof-of-work difficulty (leading hex zeros)
    #[arg(long, default_value = "4")]
    difficulty: u32,
}

#[derive(Args)]
struct InfoArgs {
    #[command(flatten)]
    chain: DbArgs,

    /// Emit the information as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct MineArgs {
    #[command(flatten)]
    chain: DbArgs,

    /// Address receiving the coinbase rewards
    #[arg(long)]
    miner: String,

    /// Founder address, used only when creating a fresh genesis
    #[arg(long)]
    founder: Option<String>,

    /// Number of mining threads
    #[arg(long, default_value = "1")]
    threads: usize,

    /// How many blocks to mine before exiting (0 = keep mining)
    #[arg(long, default_value = "1")]
    blocks: u64,
}

#[derive(Args)]
struct WalletArgs {
    #[command(subcommand)]
    action: WalletAction,
}

#[derive(Subcommand)]
enum WalletAction {
    /// Generate a new keypair and address
    New,
    /// Derive the address and public key from a private key
    Derive {
        /// Private key in hex
        private_hex: String,
    },
}

#[derive(Args)]
struct SendArgs {
    #[command(flatten)]
    chain: DbArgs,

    /// Sender private key in hex
    #[arg(long)]
    private_hex: String,

    /// Recipient address
    #[arg(long)]
    recipient: String,

    /// Amount in BSP (decimal, up to 8 places)
    #[arg(long)]
    amount: String,
}

fn main() -> ChainResult<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::Mine(args) => run_miner(&args),
        Commands::Info(args) => show_info(&args),
        Commands::Validate(args) => validate_chain(&args),
        Commands::Wallet(args) => handle_wallet(&args),
        Commands::Send(args) => send_transaction(&args),
    }
}

fn open_chain(args: &DbArgs, founder: Option<&str>) -> ChainResult<Blockchain> {
    Blockchain::open(&args.db, args.difficulty, founder)
}

fn run_miner(args: &MineArgs) -> ChainResult<()> {
    let chain = open_chain(&args.chain, args.founder.as_deref())?;
    let miner = Miner::new(args.threads);

    info!(
        miner = %args.miner,
        difficulty = args.chain.difficulty,
        "iniciando mineração local"
    );

    let mut mined = 0u64;
    while args.blocks == 0 || mined < args.blocks {
        let template = chain.get_work(&args.miner)?;
        let block = miner.solve(&template)?;

        match chain.submit_block(block) {
            Ok(()) => {
                mined += 1;
                info!(
                    height = chain.height()?,
                    reward = %template.reward,
                    balance = %chain.balance(&args.miner),
                    "bloco minerado"
                );
            }
            // outro submissor venceu a corrida; pedir novo template
            Err(ChainError::BlockExists(_) | ChainError::InvalidIndex { .. }) => continue,
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

fn show_info(args: &InfoArgs) -> ChainResult<()> {
    let chain = open_chain(&args.chain, None)?;
    let info = chain.info()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info).map_err(ChainError::from)?);
        return Ok(());
    }

    println!("height:              {}", info.height);
    println!("tip:                 {}", info.tip_hash);
    println!("difficulty:          {}", info.difficulty);
    println!("pending txs:         {}", info.pending_transactions);
    println!("utxos:               {}", info.utxo_count);
    println!("mining reward:       {} BSP", info.mining_reward);
    println!("circulating supply:  {} BSP", info.circulating_supply);
    println!("remaining supply:    {} BSP", info.remaining_supply);
    println!("max supply:          {} BSP", info.max_supply);
    if let Some(founder) = &info.founder_address {
        println!("founder:             {founder}");
    }

    let miners = chain.miner_stats(10)?;
    if !miners.is_empty() {
        println!("top miners:");
        for stat in miners {
            println!(
                "  {} - {} blocos, {} BSP",
                stat.address, stat.blocks_mined, stat.total_rewards
            );
        }
    }

    Ok(())
}

fn validate_chain(args: &DbArgs) -> ChainResult<()> {
    let chain = open_chain(args, None)?;
    chain.validate_chain()?;
    println!("cadeia válida: {} blocos auditados", chain.height()?);
    Ok(())
}

fn handle_wallet(args: &WalletArgs) -> ChainResult<()> {
    match &args.action {
        WalletAction::New => {
            let keypair = KeyPair::generate();
            println!("address:     {}", keypair.address());
            println!("public key:  {}", keypair.public_key_hex());
            println!("private key: {}", keypair.private_key_hex().as_str());
        }
        WalletAction::Derive { private_hex } => {
            let keypair = KeyPair::from_private_hex(private_hex).map_err(ChainError::Crypto)?;
            println!("address:     {}", keypair.address());
            println!("public key:  {}", keypair.public_key_hex());
        }
    }
    Ok(())
}

fn send_transaction(args: &SendArgs) -> ChainResult<()> {
    let amount = Amount::from_decimal_str(&args.amount)
        .map_err(|err| ChainError::Malformed(err.to_string()))?;
    let sender = KeyPair::from_private_hex(&args.private_hex).map_err(ChainError::Crypto)?;

    let chain = open_chain(&args.chain, None)?;
    let Some(tx) = chain.create_transaction(&sender, &args.recipient, amount)? else {
        return Err(ChainError::Malformed(format!(
            "saldo insuficiente em {}",
            sender.address()
        )));
    };

    let txid = tx.txid;
    chain.submit_transaction(tx)?;
    println!("txid: {txid}");
    println!("pendente de inclusão em bloco ({} no mempool)", chain.pending_count());
    Ok(())
}
