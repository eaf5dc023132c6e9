use std::sync::Arc;

use anyhow::Context;
use futures::{StreamExt, stream};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use landify::auth::{AuthPhase, CodeDispatch, OtpAuthenticator};
use landify::config::LandifyConfig;
use landify::dashboard::Dashboard;
use landify::gateway::{
    Api, GeoLevel, Gateway, HttpObjectStorage, ObjectStorage, fetch_places,
};
use landify::notify::{NotificationEvent, NotificationRelay, Severity};
use landify::profile::ProfileEditor;
use landify::session::{FileStore, KeyValueStore, SessionContext};
use landify::wizard::{
    AgentFlow, FarmerFlow, LandFlow, OfficerFlow, StepOutcome, Wizard, WizardFlow,
};

const HELP: &str = "\
Commands:
  login <phone>                 request a verification code
  otp <code>                    verify the code
  edit-phone                    go back to phone entry
  profile                       show the signed-in profile
  update key=value ...          edit the profile
  dashboard                     refresh and show counters
  geo [state|district|mandal <id>]
  <kind> <step> key=value ...   submit a wizard step (officer, agent, farmer, land)
  resume <kind> key=value ...   resume an existing entity record
  close <kind>                  close a wizard
  logout
  quit";

struct Wizards {
    officer: Wizard<OfficerFlow>,
    agent: Wizard<AgentFlow>,
    farmer: Wizard<FarmerFlow>,
    land: Wizard<LandFlow>,
}

struct App {
    api: Arc<dyn Api>,
    session: Arc<SessionContext>,
    auth: OtpAuthenticator,
    editor: ProfileEditor,
    dashboard: Dashboard,
    wizards: Wizards,
}

/// Parse `key=value` arguments. `true`/`false` become booleans.
fn parse_fields(args: &[&str]) -> Map<String, Value> {
    args.iter()
        .filter_map(|arg| arg.split_once('='))
        .map(|(k, v)| {
            let value = match v {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                other => Value::String(other.to_string()),
            };
            (k.trim().to_string(), value)
        })
        .collect()
}

async fn submit<F: WizardFlow>(wizard: &Wizard<F>, step: &str, args: &[&str]) {
    let Ok(step) = step.parse::<usize>() else {
        eprintln!("Step must be a number");
        return;
    };
    match wizard.submit_step(step, parse_fields(args)).await {
        Ok(StepOutcome::Advanced { next_step, entity_id }) => {
            println!("{} {entity_id}: continue with step {next_step}", wizard.flow().kind().label());
        }
        Ok(StepOutcome::Completed { entity_id }) => {
            println!("{} {entity_id}: all steps done", wizard.flow().kind().label());
        }
        Ok(StepOutcome::Detached) => {}
        Err(e) => eprintln!("❌ {e}"),
    }
}

async fn resume<F: WizardFlow>(wizard: &Wizard<F>, args: &[&str]) {
    let record = Value::Object(parse_fields(args));
    let step = wizard.resume(&record).await;
    println!("{} wizard resumed at step {step}", wizard.flow().kind().label());
}

impl App {
    async fn handle(&self, line: &str) -> anyhow::Result<bool> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = parts.split_first() else {
            return Ok(true);
        };

        match (command, args) {
            ("quit" | "exit", _) => return Ok(false),
            ("help", _) => println!("{HELP}"),
            ("login", [phone]) => match self.auth.request_code(phone).await {
                Ok(CodeDispatch::Sent) => println!("Code sent. Enter it with `otp <code>`."),
                Ok(CodeDispatch::Bypassed { code }) => println!("Test number: use code {code}"),
                Err(e) => eprintln!("❌ {e}"),
            },
            ("otp", [code]) => match self.auth.verify_code(code).await {
                Ok(profile) => println!(
                    "Welcome, {} ({})",
                    profile.name,
                    profile.display_role().unwrap_or("no role")
                ),
                Err(e) => eprintln!("❌ {e}"),
            },
            ("edit-phone", _) => {
                if let Err(e) = self.auth.edit_phone().await {
                    eprintln!("❌ {e}");
                }
            }
            ("profile", _) => match self.session.profile().await {
                Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                None => println!("Not signed in"),
            },
            ("update", fields) => {
                if let Err(e) = self.editor.update(parse_fields(fields)).await {
                    eprintln!("❌ {e}");
                }
            }
            ("dashboard", _) => match self.dashboard.load().await {
                Ok(metrics) => println!("{}", serde_json::to_string_pretty(&metrics)?),
                Err(e) => eprintln!("❌ {e}"),
            },
            ("geo", rest) => {
                let level = match rest {
                    [] => GeoLevel::States,
                    ["state", id] => GeoLevel::Districts { state_id: id.to_string() },
                    ["district", id] => GeoLevel::Mandals { district_id: id.to_string() },
                    ["mandal", id] => GeoLevel::Villages { mandal_id: id.to_string() },
                    _ => {
                        eprintln!("Usage: geo [state|district|mandal <id>]");
                        return Ok(true);
                    }
                };
                match fetch_places(self.api.as_ref(), &level).await {
                    Ok(places) => {
                        for place in places {
                            println!("  {:>6}  {}", place.id, place.name);
                        }
                    }
                    Err(e) => eprintln!("❌ {e}"),
                }
            }
            ("officer", [step, fields @ ..]) => submit(&self.wizards.officer, step, fields).await,
            ("agent", [step, fields @ ..]) => submit(&self.wizards.agent, step, fields).await,
            ("farmer", [step, fields @ ..]) => submit(&self.wizards.farmer, step, fields).await,
            ("land", [step, fields @ ..]) => submit(&self.wizards.land, step, fields).await,
            ("resume", [kind, fields @ ..]) => match *kind {
                "officer" => resume(&self.wizards.officer, fields).await,
                "agent" => resume(&self.wizards.agent, fields).await,
                "farmer" => resume(&self.wizards.farmer, fields).await,
                "land" => resume(&self.wizards.land, fields).await,
                other => eprintln!("Unknown wizard: {other}"),
            },
            ("close", [kind]) => match *kind {
                "officer" => self.wizards.officer.close().await,
                "agent" => self.wizards.agent.close().await,
                "farmer" => self.wizards.farmer.close().await,
                "land" => self.wizards.land.close().await,
                other => eprintln!("Unknown wizard: {other}"),
            },
            ("logout", _) => {
                self.close_all().await;
                match self.auth.logout().await {
                    Ok(()) => println!("Signed out"),
                    Err(e) => eprintln!("❌ {e}"),
                }
            }
            _ => eprintln!("Unknown command. Type `help`."),
        }
        Ok(true)
    }

    async fn close_all(&self) {
        self.wizards.officer.close().await;
        self.wizards.agent.close().await;
        self.wizards.farmer.close().await;
        self.wizards.land.close().await;
    }

    async fn prompt(&self) {
        let label = match self.auth.phase().await {
            AuthPhase::AwaitingPhone => "phone".to_string(),
            AuthPhase::AwaitingOtp { .. } => "otp".to_string(),
            AuthPhase::Authenticated { .. } => self
                .session
                .profile()
                .await
                .and_then(|p| p.display_role().map(str::to_string))
                .unwrap_or_else(|| "landify".to_string()),
        };
        eprint!("{label}> ");
    }
}

/// Print notifications as they appear.
fn spawn_notification_printer(mut rx: broadcast::Receiver<NotificationEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(NotificationEvent::Shown { notification }) => {
                    let icon = match notification.severity {
                        Severity::Success => "✅",
                        Severity::Info => "ℹ️ ",
                        Severity::Warning => "⚠️ ",
                        Severity::Error => "❌",
                    };
                    eprintln!("{icon} {}", notification.message);
                }
                Ok(NotificationEvent::Dismissed { id }) => {
                    tracing::debug!(%id, "Notification dismissed");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let config = LandifyConfig::from_env().context("Failed to load configuration")?;

    eprintln!("🌾 Landify v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", config.api_base_url);
    eprintln!("   Session: {}", config.session_path.display());

    // ── Session ─────────────────────────────────────────────────────────
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.session_path.clone()));
    let session = SessionContext::hydrate(store)
        .await
        .context("Failed to load session")?;

    let relay = NotificationRelay::with_default_duration(config.notify_duration);
    spawn_notification_printer(relay.subscribe());

    // ── Backend ─────────────────────────────────────────────────────────
    let api: Arc<dyn Api> = Arc::new(Gateway::new(&config, Arc::clone(&session)));
    let storage: Option<Arc<dyn ObjectStorage>> = config.upload_url.as_ref().map(|url| {
        Arc::new(HttpObjectStorage::new(url.clone(), config.api_key.clone())) as Arc<dyn ObjectStorage>
    });
    eprintln!(
        "   Uploads: {}",
        if storage.is_some() { "enabled" } else { "disabled" }
    );

    let auth = OtpAuthenticator::new(
        Arc::clone(&api),
        Arc::clone(&session),
        Arc::clone(&relay),
        config.otp_bypass.clone(),
    )
    .await;

    let app = App {
        editor: ProfileEditor::new(Arc::clone(&api), Arc::clone(&session), Arc::clone(&relay)),
        dashboard: Dashboard::new(Arc::clone(&api), Arc::clone(&session)),
        wizards: Wizards {
            officer: Wizard::new(OfficerFlow::new(storage), Arc::clone(&api), Arc::clone(&relay)),
            agent: Wizard::new(AgentFlow, Arc::clone(&api), Arc::clone(&relay)),
            farmer: Wizard::new(FarmerFlow, Arc::clone(&api), Arc::clone(&relay)),
            land: Wizard::new(LandFlow, Arc::clone(&api), Arc::clone(&relay)),
        },
        api,
        session,
        auth,
    };

    eprintln!("   Type `help` for commands.\n");

    // ── REPL ────────────────────────────────────────────────────────────
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });
    let mut input = Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    }));

    app.prompt().await;
    while let Some(line) = input.next().await {
        if !app.handle(line.trim()).await? {
            break;
        }
        app.prompt().await;
    }

    Ok(())
}
