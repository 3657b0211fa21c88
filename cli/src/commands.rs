//! Command handlers.
//!
//! Each handler performs one operation against an [`App`] and returns the
//! JSON value `main` prints. Handlers never print themselves.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use dcent_contracts::{
    BilateralManager, CollateralLedger, ContractRepository, MultisigManager, MultisigTerms,
    TrustEngine, TrustParams, TrustService,
};
use dcent_protocol::crypto::PeerPublicKey;
use dcent_protocol::identity::{KeyRecord, Keystore, PeerId};
use dcent_protocol::storage::{SledStore, Store};

use crate::cli::{Commands, MultisigCommands, MultisigCreateArgs, TrustArgs};

/// Everything a command needs, wired over one store.
pub struct App {
    keystore: Keystore,
    ledger: CollateralLedger,
    contracts: ContractRepository,
    bilateral: BilateralManager,
    multisig: MultisigManager,
}

impl App {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let keystore = Keystore::new(store.clone());
        let identities = Arc::new(keystore.clone());
        Self {
            ledger: CollateralLedger::new(store.clone()),
            contracts: ContractRepository::new(store.clone()),
            bilateral: BilateralManager::new(store.clone(), identities.clone()),
            multisig: MultisigManager::new(store, identities),
            keystore,
        }
    }

    /// Open (or create) the sled database under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).with_context(|| {
            format!("failed to create data directory: {}", data_dir.display())
        })?;
        let db_path = data_dir.join("db");
        let store = SledStore::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;
        tracing::debug!(path = %db_path.display(), "database opened");
        Ok(Self::new(Arc::new(store)))
    }

    /// Resolve a `dcent1…` address or a keystore label.
    pub fn resolve_peer(&self, name: &str) -> Result<PeerId> {
        if let Ok(peer) = name.parse::<PeerId>() {
            return Ok(peer);
        }
        self.keystore
            .find_by_label(name)?
            .map(|record| record.peer_id)
            .ok_or_else(|| anyhow!("unknown peer '{name}': not an address or a stored label"))
    }

    fn resolve_all(&self, names: &[String]) -> Result<Vec<PeerId>> {
        names.iter().map(|n| self.resolve_peer(n)).collect()
    }
}

/// Public view of a stored key.
#[derive(Debug, Serialize)]
struct KeyView {
    peer_id: PeerId,
    label: Option<String>,
    public_key: PeerPublicKey,
    created_at: DateTime<Utc>,
}

impl From<&KeyRecord> for KeyView {
    fn from(record: &KeyRecord) -> Self {
        Self {
            peer_id: record.peer_id,
            label: record.label.clone(),
            public_key: record.public_key(),
            created_at: record.created_at,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("failed to serialize output")
}

/// Run one command.
pub fn run(app: &App, command: Commands) -> Result<Value> {
    match command {
        Commands::Keygen { label } => {
            let record = app.keystore.generate(label)?;
            to_json(&KeyView::from(&record))
        }
        Commands::Keys => {
            let views: Vec<KeyView> = app.keystore.list()?.iter().map(KeyView::from).collect();
            to_json(&views)
        }
        Commands::Fund(args) => {
            let peer = app.resolve_peer(&args.peer)?;
            let balance = app.ledger.credit(&peer, args.amount)?;
            Ok(json!({ "peer": peer, "amount": balance }))
        }
        Commands::SetBalance(args) => {
            let peer = app.resolve_peer(&args.peer)?;
            app.ledger.set(&peer, args.amount)?;
            Ok(json!({ "peer": peer, "amount": args.amount }))
        }
        Commands::Balance { peer: Some(name) } => {
            let peer = app.resolve_peer(&name)?;
            Ok(json!({ "peer": peer, "amount": app.ledger.get(&peer)? }))
        }
        Commands::Balance { peer: None } => to_json(&app.ledger.balances()?),
        Commands::Create(args) => {
            let from = app.resolve_peer(&args.from)?;
            let to = app.resolve_peer(&args.to)?;
            let created = app
                .bilateral
                .create(&from, &to, &args.content, args.amount, args.collateral)
                .context("failed to create contract")?;
            to_json(&created)
        }
        Commands::Vote {
            contract_id,
            peer,
            vote,
        } => {
            let peer = app.resolve_peer(&peer)?;
            let contract = app
                .bilateral
                .set_status(&contract_id, &peer, vote)
                .with_context(|| format!("failed to record vote on {contract_id}"))?;
            to_json(&contract)
        }
        Commands::Decrypt { contract_id, peer } => {
            let peer = app.resolve_peer(&peer)?;
            let contract = app
                .bilateral
                .get(&contract_id)?
                .ok_or_else(|| anyhow!("bilateral contract not found: {contract_id}"))?;
            to_json(&app.bilateral.decrypt(&contract, &peer)?)
        }
        Commands::Verify { contract_id } => {
            let contract = app
                .bilateral
                .get(&contract_id)?
                .ok_or_else(|| anyhow!("bilateral contract not found: {contract_id}"))?;
            let valid = app.bilateral.verify_signature(&contract)?;
            Ok(json!({ "contract_id": contract_id, "valid": valid }))
        }
        Commands::List => to_json(&app.contracts.all()?),
        Commands::Multisig(command) => run_multisig(app, command),
        Commands::Trust(args) => run_trust(app, args),
    }
}

fn run_multisig(app: &App, command: MultisigCommands) -> Result<Value> {
    match command {
        MultisigCommands::Create(args) => {
            let terms = multisig_terms(app, args)?;
            let contract = app
                .multisig
                .create(terms)
                .context("failed to create multisig contract")?;
            to_json(&contract)
        }
        MultisigCommands::Sign { contract_id, peer } => {
            let peer = app.resolve_peer(&peer)?;
            to_json(&app.multisig.sign(&contract_id, &peer)?)
        }
        MultisigCommands::Break { contract_id, peer } => {
            let peer = app.resolve_peer(&peer)?;
            to_json(&app.multisig.break_contract(&contract_id, &peer)?)
        }
        MultisigCommands::Verify { contract_id } => {
            let contract = app
                .multisig
                .get(&contract_id)?
                .ok_or_else(|| anyhow!("multisig contract not found: {contract_id}"))?;
            let valid = app.multisig.verify_multisig(&contract)?;
            Ok(json!({
                "contract_id": contract_id,
                "valid": valid,
                "signatures": contract.signatures.len(),
            }))
        }
    }
}

fn multisig_terms(app: &App, args: MultisigCreateArgs) -> Result<MultisigTerms> {
    Ok(MultisigTerms {
        participants: app.resolve_all(&args.participants)?,
        threshold: args.threshold,
        content: args.content,
        amount: args.amount,
        from_peers: app.resolve_all(&args.from_peers)?,
        to_peers: app.resolve_all(&args.to_peers)?,
        collateral_amount: args.collateral,
    })
}

fn trust_params(args: &TrustArgs) -> Result<TrustParams> {
    let defaults = TrustParams::default();
    let params = TrustParams {
        max_trust: args.max_trust.unwrap_or(defaults.max_trust),
        k: args.k.unwrap_or(defaults.k),
        alpha: args.alpha.unwrap_or(defaults.alpha),
        beta: args.beta.unwrap_or(defaults.beta),
        gamma: args.gamma.unwrap_or(defaults.gamma),
        delta: args.delta.unwrap_or(defaults.delta),
    };
    let weights = [params.k, params.alpha, params.beta, params.gamma, params.delta];
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        bail!("trust parameters must be finite and non-negative");
    }
    Ok(params)
}

fn run_trust(app: &App, args: TrustArgs) -> Result<Value> {
    let engine = TrustEngine::new(trust_params(&args)?);
    let service = TrustService::new(app.contracts.clone(), engine);

    match &args.peer {
        Some(name) => {
            let peer = app.resolve_peer(name)?;
            to_json(&service.trust_record(&peer)?)
        }
        None => {
            let records: Vec<_> = service.score_all()?.into_values().collect();
            to_json(&records)
        }
    }
}
