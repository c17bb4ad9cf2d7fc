//! Verification API
//!
//! Independent audit of a finished game:
//!
//! 1. fetch the ciphertext handles, board size and owner from the registry
//! 2. ask the oracle to decrypt them under a signed authorization
//! 3. unpack the plaintext into tile flags
//! 4. render a verdict
//!
//! The verdict only says the original ciphertext decrypts to a well-formed
//! board. The commitment does not cover board content, so nothing binds the
//! decrypted board to the commitment. `disclosure_matches` compares it with
//! the board disclosed by `reveal_game` for information only; it never
//! changes the verdict.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::core::board::{Board, BoardError};
use crate::core::hash::Hash32;
use crate::game::encrypted::{BoardEncoding, CiphertextHandle};
use crate::game::registry::{GameRegistry, RegistryError};
use crate::game::state::{CommitHash, GameId, Identity};
use crate::network::auth::DecryptAuthorization;
use crate::oracle::{DecryptRequest, EncryptionOracle, OracleError};
use crate::proof::commitment::CommitmentPreimage;

/// Why a verification did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationFailure {
    /// Unknown game.
    #[error("game {0} not found")]
    GameNotFound(GameId),
    /// Oracle refused or failed.
    #[error("oracle: {0}")]
    Oracle(OracleError),
    /// Oracle answered without a value for a handle.
    #[error("no plaintext for {0}")]
    MissingPlaintext(CiphertextHandle),
    /// Plaintext is not a valid board.
    #[error("malformed plaintext: {0}")]
    MalformedPlaintext(BoardError),
}

/// Outcome of a verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The original ciphertext decrypts to a well-formed board.
    Successful {
        /// Decrypted board.
        board: Board,
        /// Digest of the decrypted board.
        board_digest: Hash32,
    },
    /// Verification could not complete.
    Failed(VerificationFailure),
}

/// Everything the pipeline needs from the registry, copied out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationTarget {
    /// Game.
    pub game_id: GameId,
    /// Registry contract.
    pub contract: Identity,
    /// Game creator.
    pub owner: Identity,
    /// Tile count.
    pub board_size: u8,
    /// Stored ciphertext layout.
    pub encoding: BoardEncoding,
    /// Board disclosed by `reveal_game`, if any.
    pub disclosed: Option<Board>,
}

impl VerificationTarget {
    /// Copy a game's verification inputs out of the registry.
    pub fn fetch(registry: &GameRegistry, game_id: GameId) -> Result<Self, VerificationFailure> {
        let lookup = |e: RegistryError| match e {
            RegistryError::GameNotFound(id) => VerificationFailure::GameNotFound(id),
            _ => VerificationFailure::GameNotFound(game_id),
        };

        let game = registry.get_game(game_id).map_err(lookup)?;
        let encoding = registry.get_encoding(game_id).map_err(lookup)?;

        Ok(Self {
            game_id,
            contract: registry.contract(),
            owner: game.owner,
            board_size: game.board_size,
            encoding: encoding.clone(),
            disclosed: game.revealed_board.clone(),
        })
    }
}

/// Result of one verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Game.
    pub game_id: GameId,
    /// Identity that requested decryption.
    pub requester: Identity,
    /// Handles sent to the oracle.
    pub handles: Vec<CiphertextHandle>,
    /// Outcome.
    pub verdict: Verdict,
    /// Decrypted board equals the disclosed board. `None` if either is missing.
    pub disclosure_matches: Option<bool>,
}

impl VerificationReport {
    /// Did verification succeed?
    pub fn is_successful(&self) -> bool {
        matches!(self.verdict, Verdict::Successful { .. })
    }

    /// Decrypted board, if any.
    pub fn board(&self) -> Option<&Board> {
        match &self.verdict {
            Verdict::Successful { board, .. } => Some(board),
            Verdict::Failed(_) => None,
        }
    }

    /// Plain-text rendering.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Game {} verification", self.game_id);
        match &self.verdict {
            Verdict::Successful {
                board,
                board_digest,
            } => {
                let _ = writeln!(out, "Verification Successful!");
                let _ = writeln!(
                    out,
                    "Board: {} tiles, {} bombs",
                    board.len(),
                    board.bomb_count()
                );
                let _ = writeln!(out, "Tiles: {:?}", board.to_values());
                let _ = writeln!(out, "Digest: 0x{}", hex::encode(board_digest));
            }
            Verdict::Failed(failure) => {
                let _ = writeln!(out, "Verification Failed: {failure}");
            }
        }
        match self.disclosure_matches {
            Some(true) => {
                let _ = writeln!(out, "Disclosed board matches decrypted board");
            }
            Some(false) => {
                let _ = writeln!(out, "WARNING: disclosed board differs from decrypted board");
            }
            None => {}
        }
        out
    }

    /// HTML rendering: a tile grid with `cols` columns (square-ish if `None`).
    pub fn render_html(&self, cols: Option<usize>) -> String {
        match &self.verdict {
            Verdict::Successful { board, .. } => {
                let cols = cols.filter(|c| *c > 0).unwrap_or_else(|| default_cols(board.len()));
                let mut html = String::new();
                html.push_str(
                    r#"<div style="display:flex;flex-direction:column;align-items:center;gap:12px">"#,
                );
                let _ = write!(
                    html,
                    r#"<div style="display:grid;grid-template-columns:repeat({cols},64px);gap:6px">"#
                );
                for bomb in board.tiles() {
                    if *bomb {
                        html.push_str(
                            r#"<div class="tile bomb" style="background:#c0392b;width:64px;height:64px;border-radius:8px"></div>"#,
                        );
                    } else {
                        html.push_str(
                            r#"<div class="tile safe" style="background:#27ae60;width:64px;height:64px;border-radius:8px"></div>"#,
                        );
                    }
                }
                html.push_str("</div>");
                let _ = write!(
                    html,
                    r#"<div style="text-align:center">Verification Successful!<br/>Game {} &middot; {} bombs</div>"#,
                    self.game_id,
                    board.bomb_count()
                );
                if self.disclosure_matches == Some(false) {
                    html.push_str(
                        r#"<div style="text-align:center;color:#e67e22">Disclosed board differs from decrypted board</div>"#,
                    );
                }
                html.push_str("</div>");
                html
            }
            Verdict::Failed(failure) => format!(
                r#"<div style="text-align:center;color:red">Error: {}</div>"#,
                escape_html(&failure.to_string())
            ),
        }
    }
}

/// Columns for a roughly square grid.
fn default_cols(tiles: usize) -> usize {
    let mut cols = 1;
    while cols * cols < tiles {
        cols += 1;
    }
    cols
}

pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Runs fetch, decrypt, unpack and verdict against an injected oracle.
#[derive(Clone)]
pub struct VerificationPipeline {
    oracle: Arc<dyn EncryptionOracle>,
}

impl VerificationPipeline {
    /// Create a pipeline over `oracle`.
    pub fn new(oracle: Arc<dyn EncryptionOracle>) -> Self {
        Self { oracle }
    }

    /// Verify a game held in `registry`. Never fails; failures are verdicts.
    pub async fn verify_game(
        &self,
        registry: &GameRegistry,
        game_id: GameId,
        authorization: &DecryptAuthorization,
    ) -> VerificationReport {
        match VerificationTarget::fetch(registry, game_id) {
            Ok(target) => self.verify_target(&target, authorization).await,
            Err(failure) => VerificationReport {
                game_id,
                requester: authorization.requester,
                handles: Vec::new(),
                verdict: Verdict::Failed(failure),
                disclosure_matches: None,
            },
        }
    }

    /// Verify an already fetched target.
    pub async fn verify_target(
        &self,
        target: &VerificationTarget,
        authorization: &DecryptAuthorization,
    ) -> VerificationReport {
        let handles = target.encoding.handles();
        let request = DecryptRequest {
            handles: handles.clone(),
            contract: target.contract,
            authorization: authorization.clone(),
        };

        let verdict = match self.oracle.decrypt(request).await {
            Ok(plaintexts) => match unpack(target, &plaintexts) {
                Ok(board) => Verdict::Successful {
                    board_digest: board.digest(),
                    board,
                },
                Err(failure) => Verdict::Failed(failure),
            },
            Err(e) => {
                error!(game_id = %target.game_id, error = %e, "Decryption failed");
                Verdict::Failed(VerificationFailure::Oracle(e))
            }
        };

        let disclosure_matches = match (&verdict, &target.disclosed) {
            (Verdict::Successful { board, .. }, Some(disclosed)) => Some(board == disclosed),
            _ => None,
        };
        if disclosure_matches == Some(false) {
            warn!(
                game_id = %target.game_id,
                "Disclosed board differs from decrypted ciphertext"
            );
        }

        info!(
            game_id = %target.game_id,
            requester = %authorization.requester,
            successful = matches!(verdict, Verdict::Successful { .. }),
            "Verification finished"
        );

        VerificationReport {
            game_id: target.game_id,
            requester: authorization.requester,
            handles,
            verdict,
            disclosure_matches,
        }
    }
}

/// Turn decrypted values into tile flags.
fn unpack(
    target: &VerificationTarget,
    plaintexts: &BTreeMap<CiphertextHandle, u64>,
) -> Result<Board, VerificationFailure> {
    let lookup = |handle: &CiphertextHandle| {
        plaintexts
            .get(handle)
            .copied()
            .ok_or(VerificationFailure::MissingPlaintext(*handle))
    };

    match &target.encoding {
        BoardEncoding::Packed(handle) => {
            let value = lookup(handle)?;
            Board::unpack(value, target.board_size as usize)
                .map_err(VerificationFailure::MalformedPlaintext)
        }
        BoardEncoding::PerTile(handles) => {
            let values = handles.iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
            Board::from_values(values).map_err(VerificationFailure::MalformedPlaintext)
        }
    }
}

// =============================================================================
// COMMITMENT AUDIT
// =============================================================================

/// Result of recomputing a game's commitment from a published preimage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentAudit {
    /// Game.
    pub game_id: GameId,
    /// Commitment stored at creation.
    pub expected: CommitHash,
    /// Commitment recomputed from the preimage.
    pub computed: CommitHash,
    /// Preimage player is the game's owner.
    pub owner_matches: bool,
}

impl CommitmentAudit {
    /// Recomputed commitment equals the stored one.
    pub fn matched(&self) -> bool {
        self.expected == self.computed
    }

    /// Plain-text rendering.
    pub fn render_text(&self) -> String {
        let verdict = if self.matched() {
            "Commitment matches"
        } else {
            "Commitment MISMATCH"
        };
        format!(
            "Game {}: {}\nExpected: {}\nComputed: {}\n",
            self.game_id, verdict, self.expected, self.computed
        )
    }

    /// HTML rendering.
    pub fn render_html(&self) -> String {
        let (color, verdict) = if self.matched() {
            ("#27ae60", "Commitment matches")
        } else {
            ("#c0392b", "Commitment mismatch")
        };
        format!(
            concat!(
                r#"<div style="text-align:center;font-family:monospace">"#,
                r#"<h3 style="color:{color}">Game {game}: {verdict}</h3>"#,
                r#"<div>Expected: {expected}</div>"#,
                r#"<div>Computed: {computed}</div>"#,
                "</div>"
            ),
            color = color,
            game = self.game_id,
            verdict = verdict,
            expected = self.expected,
            computed = self.computed,
        )
    }
}

/// Recompute a game's commitment from `preimage`.
pub fn audit_commitment(
    registry: &GameRegistry,
    game_id: GameId,
    preimage: &CommitmentPreimage,
) -> Result<CommitmentAudit, RegistryError> {
    let game = registry.get_game(game_id)?;
    let audit = CommitmentAudit {
        game_id,
        expected: game.commit_hash,
        computed: preimage.commitment(),
        owner_matches: preimage.player == game.owner,
    };
    if !audit.matched() {
        warn!(game_id = %game_id, "Commitment audit mismatch");
    }
    Ok(audit)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::board::BoardDisclosure;
    use crate::game::state::Seed;
    use crate::network::auth::{sign_authorization, AuthConfig};
    use crate::oracle::{EncryptTarget, EncryptionWorker, LocalOracle};
    use crate::proof::commitment::commit;
    use alloy_primitives::Address;

    const SECRET: &str = "verify-secret";
    const NOW: u64 = 1_700_000_000;

    fn contract() -> Identity {
        Identity::new(Address::repeat_byte(0xCC))
    }

    fn player() -> Identity {
        Identity::new(Address::repeat_byte(0x11))
    }

    fn auth_for(requester: Identity) -> DecryptAuthorization {
        sign_authorization(&requester, &[contract()], NOW, 10, &AuthConfig::with_secret(SECRET))
            .unwrap()
    }

    struct Fixture {
        oracle: LocalOracle,
        registry: GameRegistry,
        game_id: GameId,
    }

    async fn fixture(values: &[u8], packed: bool) -> Fixture {
        let oracle = LocalOracle::new(AuthConfig::with_secret(SECRET)).with_clock(NOW);
        let worker = EncryptionWorker::spawn(Arc::new(oracle.clone()));
        let board = Board::from_values(values.iter().copied()).unwrap();
        let target = EncryptTarget {
            contract: contract(),
            user: player(),
        };
        let (encoding, proof) = worker.encrypt_board(target, &board, packed).await.unwrap();
        worker.shutdown().await.unwrap();

        let size = values.len() as u8;
        let mut registry = GameRegistry::new(contract(), Arc::new(oracle.clone()));
        let game_id = registry
            .create_game(&player(), encoding, &proof, commit(&Seed::from(123456), &player(), size), size)
            .unwrap();

        Fixture {
            oracle,
            registry,
            game_id,
        }
    }

    #[tokio::test]
    async fn test_packed_verification_successful() {
        let f = fixture(&[0, 0, 1, 0, 0], true).await;
        let pipeline = VerificationPipeline::new(Arc::new(f.oracle.clone()));

        let report = pipeline.verify_game(&f.registry, f.game_id, &auth_for(player())).await;

        assert!(report.is_successful());
        assert_eq!(report.board().unwrap().to_values(), vec![0, 0, 1, 0, 0]);
        assert_eq!(report.handles.len(), 1);
        assert_eq!(report.disclosure_matches, None);
        assert!(report.render_text().contains("Verification Successful!"));
    }

    #[tokio::test]
    async fn test_per_tile_verification_successful() {
        let f = fixture(&[0, 0, 1, 0], false).await;
        let pipeline = VerificationPipeline::new(Arc::new(f.oracle.clone()));

        let report = pipeline.verify_game(&f.registry, f.game_id, &auth_for(player())).await;
        assert_eq!(report.board().unwrap().to_values(), vec![0, 0, 1, 0]);
        assert_eq!(report.handles.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_game_is_a_verdict() {
        let f = fixture(&[1], true).await;
        let pipeline = VerificationPipeline::new(Arc::new(f.oracle.clone()));

        let report = pipeline.verify_game(&f.registry, GameId(42), &auth_for(player())).await;
        assert_eq!(
            report.verdict,
            Verdict::Failed(VerificationFailure::GameNotFound(GameId(42)))
        );
    }

    #[tokio::test]
    async fn test_unauthorized_requester_fails() {
        let f = fixture(&[0, 1], true).await;
        let pipeline = VerificationPipeline::new(Arc::new(f.oracle.clone()));
        let auditor = Identity::new(Address::repeat_byte(0x33));

        let report = pipeline.verify_game(&f.registry, f.game_id, &auth_for(auditor)).await;
        assert!(matches!(
            report.verdict,
            Verdict::Failed(VerificationFailure::Oracle(OracleError::AccessDenied { .. }))
        ));
        assert!(report.render_html(None).contains("Error:"));

        // Granting access lets the auditor verify
        let handle = f.registry.get_encrypted_board(f.game_id).unwrap();
        f.oracle.grant_access(&handle, auditor).unwrap();
        let report = pipeline.verify_game(&f.registry, f.game_id, &auth_for(auditor)).await;
        assert!(report.is_successful());
    }

    #[tokio::test]
    async fn test_disclosure_mismatch_does_not_change_verdict() {
        let mut f = fixture(&[0, 0, 1, 0, 0], true).await;
        let id = f.game_id;
        f.registry.end_game(&player(), id).unwrap();
        f.registry.reveal_seed(&player(), id, Seed::from(123456)).unwrap();
        // Disclose a different board than the one encrypted
        f.registry
            .reveal_game(&player(), id, BoardDisclosure::Packed(0b00001))
            .unwrap();

        let pipeline = VerificationPipeline::new(Arc::new(f.oracle.clone()));
        let report = pipeline.verify_game(&f.registry, id, &auth_for(player())).await;

        assert!(report.is_successful());
        assert_eq!(report.disclosure_matches, Some(false));
        assert!(report.render_text().contains("WARNING"));
    }

    #[tokio::test]
    async fn test_disclosure_match_reported() {
        let mut f = fixture(&[0, 0, 1, 0, 0], true).await;
        let id = f.game_id;
        f.registry.end_game(&player(), id).unwrap();
        f.registry.reveal_seed(&player(), id, Seed::from(123456)).unwrap();
        f.registry
            .reveal_game(&player(), id, BoardDisclosure::Packed(0b00100))
            .unwrap();

        let pipeline = VerificationPipeline::new(Arc::new(f.oracle.clone()));
        let report = pipeline.verify_game(&f.registry, id, &auth_for(player())).await;
        assert_eq!(report.disclosure_matches, Some(true));
    }

    #[test]
    fn test_malformed_plaintext() {
        let handle = CiphertextHandle::default();
        let target = VerificationTarget {
            game_id: GameId(0),
            contract: contract(),
            owner: player(),
            board_size: 3,
            encoding: BoardEncoding::PerTile(vec![handle, handle, handle]),
            disclosed: None,
        };
        let plaintexts = BTreeMap::from([(handle, 7u64)]);

        assert!(matches!(
            unpack(&target, &plaintexts),
            Err(VerificationFailure::MalformedPlaintext(BoardError::InvalidTile { .. }))
        ));
        assert_eq!(
            unpack(&target, &BTreeMap::new()),
            Err(VerificationFailure::MissingPlaintext(handle))
        );
    }

    #[test]
    fn test_html_grid_columns() {
        let report = VerificationReport {
            game_id: GameId(0),
            requester: player(),
            handles: vec![],
            verdict: Verdict::Successful {
                board: Board::new(vec![false, true, false, false]),
                board_digest: [0; 32],
            },
            disclosure_matches: None,
        };

        let html = report.render_html(None);
        assert!(html.contains("repeat(2,64px)"));
        assert_eq!(html.matches("tile bomb").count(), 1);
        assert_eq!(html.matches("tile safe").count(), 3);
        assert!(report.render_html(Some(4)).contains("repeat(4,64px)"));
    }

    #[tokio::test]
    async fn test_audit_commitment() {
        let f = fixture(&[0, 0, 1, 0, 0], true).await;

        let good = CommitmentPreimage::new(Seed::from(123456), player(), 5);
        let audit = audit_commitment(&f.registry, f.game_id, &good).unwrap();
        assert!(audit.matched());
        assert!(audit.owner_matches);
        assert!(audit.render_html().contains("Commitment matches"));

        let bad = CommitmentPreimage::new(Seed::from(222), player(), 5);
        let audit = audit_commitment(&f.registry, f.game_id, &bad).unwrap();
        assert!(!audit.matched());
        assert!(audit.render_text().contains("MISMATCH"));

        assert!(matches!(
            audit_commitment(&f.registry, GameId(7), &good),
            Err(RegistryError::GameNotFound(_))
        ));
    }

    #[test]
    fn test_default_cols() {
        assert_eq!(default_cols(1), 1);
        assert_eq!(default_cols(5), 3);
        assert_eq!(default_cols(16), 4);
        assert_eq!(default_cols(64), 8);
    }
}
