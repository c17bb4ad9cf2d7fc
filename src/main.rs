//! Confidential Bomb Verification Server
//!
//! Serves `POST /verify` over a registry rebuilt from a ledger journal,
//! or over a freshly played demo game when no journal is configured.

use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use confidential_bomb::{
    commit,
    core::board::{Board, BoardDisclosure},
    game::{registry::GameRegistry, state::{Identity, Seed}},
    network::{
        auth::{sign_authorization, AuthConfig, DEFAULT_DURATION_DAYS},
        server::{AppState, ServerConfig, ServerError, VerifyServer},
    },
    oracle::{EncryptTarget, EncryptionWorker, LocalOracle},
    proof::journal::{replay, LedgerJournal},
    VerificationPipeline, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Confidential Bomb Verifier v{}", VERSION);

    let config = ServerConfig::from_env()?;
    let auth = AuthConfig::from_env();
    if !auth.is_configured() {
        warn!("AUTH_SECRET not set; decrypted board reports will be refused");
    }
    let oracle = LocalOracle::new(auth.clone());

    let registry = match &config.ledger_journal {
        Some(path) => {
            let journal = LedgerJournal::load(path)
                .with_context(|| format!("loading journal {}", path.display()))?;
            if journal.contract != config.contract_address {
                return Err(ServerError::ContractMismatch {
                    journal: journal.contract,
                    configured: config.contract_address,
                }
                .into());
            }
            let registry = replay(&journal, Arc::new(oracle.clone()))?;
            info!(
                "Replayed {} entries, {} games, state root {}",
                journal.len(),
                registry.game_count(),
                hex::encode(registry.state_root())
            );
            warn!("Local oracle holds no ciphertexts from the journal; board reports will not decrypt");
            registry
        }
        None => demo_registry(&config, &oracle, &auth).await?,
    };

    let state = AppState::new(registry, VerificationPipeline::new(Arc::new(oracle)));
    let server = Arc::new(VerifyServer::new(config, state));

    let runner = server.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    handle.await??;

    info!("Server stopped");
    Ok(())
}

/// Play one packed game end to end so the endpoint has something to serve.
async fn demo_registry(
    config: &ServerConfig,
    oracle: &LocalOracle,
    auth: &AuthConfig,
) -> anyhow::Result<GameRegistry> {
    info!("=== Seeding Demo Game ===");

    let player = Identity::new(Address::repeat_byte(0x11));
    let seed = Seed::from(123_456);
    let board = Board::from_values([0u8, 0, 1, 0, 0])?;
    let board_size = board.len() as u8;

    let worker = EncryptionWorker::spawn(Arc::new(oracle.clone()));
    let target = EncryptTarget {
        contract: config.contract_address,
        user: player,
    };
    let (encoding, proof) = worker.encrypt_board(target, &board, true).await?;
    worker.shutdown().await?;

    let mut registry = GameRegistry::new(config.contract_address, Arc::new(oracle.clone()));
    let game_id = registry.create_game(
        &player,
        encoding,
        &proof,
        commit(&seed, &player, board_size),
        board_size,
    )?;
    registry.pick_tile(&player, game_id, 0)?;
    registry.end_game(&player, game_id)?;
    registry.reveal_seed(&player, game_id, seed)?;
    registry.reveal_game(&player, game_id, BoardDisclosure::Packed(board.pack()?))?;

    info!("Game {} by {}", game_id, player);
    info!("Commit: {}", registry.get_commit_hash(game_id)?);
    info!("State root: {}", hex::encode(registry.state_root()));

    if auth.is_configured() {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let authorization = sign_authorization(
            &player,
            &[config.contract_address],
            now,
            DEFAULT_DURATION_DAYS,
            auth,
        )?;
        info!(
            "Demo authorization: {}",
            serde_json::to_string(&authorization)?
        );
    }

    Ok(registry)
}
