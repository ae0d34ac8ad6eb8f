//! REPL – Read-Eval-Print Loop for the engram shell.
//!
//! Parsing ([`Command::parse`]) is pure; [`execute`] applies a command to a
//! coordinator and prints the result.

use colored::Colorize;
use engram_embedding::Emotion;
use engram_routing::FnHandler;
use engram_runtime::{ConsolidationRecord, EngineState, MemoryCoordinator};
use engram_types::{Modality, Priority};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Topic whose handler echoes payloads back; always registered.
pub const ECHO_TOPIC: &str = "echo";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Store { priority: Priority, content: Value },
    Get { id: String },
    Focus { modality: Modality, target: String, intensity: f64 },
    Emotion { emotion: Emotion, intensity: f32 },
    Topic { name: String, features: BTreeMap<String, f32> },
    Route { topic: String, payload: Value },
    Event { event: Value },
    Decision { decision: Value },
    Frames { count: usize },
    Consolidate,
    Tick,
    Snapshot { id: String, metric: Option<f64> },
    Rollback { id: String },
    Diff { from: String, to: String },
    Status,
    Save { path: PathBuf },
    Load { path: PathBuf },
    Quit,
}

/// Whether the loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

impl Command {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Command, String> {
        let (verb, rest) = split_word(line.trim());
        match verb {
            "/help" => Ok(Command::Help),
            "/store" => {
                let (priority, content) = split_word(rest);
                let priority = priority.parse::<Priority>().map_err(|e| e.to_string())?;
                if content.is_empty() {
                    return Err("usage: /store <priority> <text|json>".into());
                }
                Ok(Command::Store { priority, content: json_or_text(content) })
            }
            "/get" => Ok(Command::Get { id: required(rest, "/get <id>")?.to_string() }),
            "/focus" => {
                let mut words = rest.split_whitespace();
                let (Some(modality), Some(target)) = (words.next(), words.next()) else {
                    return Err("usage: /focus <modality> <target> [intensity]".into());
                };
                let intensity = match words.next() {
                    Some(raw) => parse_number(raw)?,
                    None => 1.0,
                };
                Ok(Command::Focus {
                    modality: modality.parse().map_err(|e: engram_types::EngramError| e.to_string())?,
                    target: target.to_string(),
                    intensity,
                })
            }
            "/emotion" => {
                let mut words = rest.split_whitespace();
                let (Some(emotion), Some(raw)) = (words.next(), words.next()) else {
                    return Err("usage: /emotion <name> <intensity>".into());
                };
                Ok(Command::Emotion {
                    emotion: emotion.parse().map_err(|e: engram_types::EngramError| e.to_string())?,
                    intensity: parse_number(raw)? as f32,
                })
            }
            "/topic" => {
                let mut words = rest.split_whitespace();
                let name = words.next().ok_or("usage: /topic <name> [feature=weight ...]")?;
                let mut features = BTreeMap::new();
                for pair in words {
                    let (k, v) = pair
                        .split_once('=')
                        .ok_or_else(|| format!("expected feature=weight, got '{pair}'"))?;
                    features.insert(k.to_string(), parse_number(v)? as f32);
                }
                if features.is_empty() {
                    features.insert(name.to_string(), 1.0);
                }
                Ok(Command::Topic { name: name.to_string(), features })
            }
            "/route" => {
                let (topic, payload) = split_word(rest);
                if topic.is_empty() {
                    return Err("usage: /route <topic> <json>".into());
                }
                Ok(Command::Route { topic: topic.to_string(), payload: json_or_text(payload) })
            }
            "/event" => Ok(Command::Event {
                event: json_or_text(required(rest, "/event <text|json>")?),
            }),
            "/decision" => Ok(Command::Decision {
                decision: json_or_text(required(rest, "/decision <text|json>")?),
            }),
            "/frames" => {
                let count = if rest.is_empty() {
                    5
                } else {
                    rest.parse::<usize>()
                        .map_err(|_| format!("expected a frame count, got '{rest}'"))?
                };
                Ok(Command::Frames { count })
            }
            "/consolidate" => Ok(Command::Consolidate),
            "/tick" => Ok(Command::Tick),
            "/snapshot" => {
                let (id, metric) = split_word(rest);
                let id = required(id, "/snapshot <id> [metric]")?.to_string();
                let metric = if metric.is_empty() { None } else { Some(parse_number(metric)?) };
                Ok(Command::Snapshot { id, metric })
            }
            "/rollback" => Ok(Command::Rollback { id: required(rest, "/rollback <id>")?.to_string() }),
            "/diff" => {
                let mut words = rest.split_whitespace();
                let (Some(from), Some(to)) = (words.next(), words.next()) else {
                    return Err("usage: /diff <from> <to>".into());
                };
                Ok(Command::Diff { from: from.to_string(), to: to.to_string() })
            }
            "/status" => Ok(Command::Status),
            "/save" => Ok(Command::Save { path: required(rest, "/save <path>")?.into() }),
            "/load" => Ok(Command::Load { path: required(rest, "/load <path>")?.into() }),
            "/quit" | "/exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(mut engine: MemoryCoordinator, shutdown: Arc<AtomicBool>) {
    engine.register_handler(ECHO_TOPIC, Arc::new(FnHandler::new("echo", |_, payload| payload.clone())));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "engram>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Ok(cmd) => {
                if execute(&mut engine, cmd) == Flow::Quit {
                    println!("{}", "Goodbye.".green());
                    break;
                }
            }
            Err(e) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                e,
                "/help".bold()
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

pub fn execute(engine: &mut MemoryCoordinator, cmd: Command) -> Flow {
    match cmd {
        Command::Help => cmd_help(),
        Command::Store { priority, content } => {
            let id = engine.store(content, priority);
            println!("{} {}", "stored".green(), id.bold());
        }
        Command::Get { id } => match engine.retrieve(&id) {
            Ok(value) => {
                let tier = engine.locate(&id).map_or("?", |t| t.as_str());
                println!("  [{}] {}", tier.dimmed(), value);
            }
            Err(e) => println!("{} {}", "✗".red(), e),
        },
        Command::Focus { modality, target, intensity } => {
            engine.set_focus(modality, &target, intensity);
            match engine.attention().primary() {
                Some((m, f)) => println!("  primary focus: {} → {}", m.to_string().bold(), f.target),
                None => println!("  no primary focus"),
            }
        }
        Command::Emotion { emotion, intensity } => {
            engine.update_emotion(emotion, intensity);
            let e = engine.emotions();
            println!(
                "  valence {:+.2}  arousal {:.2}  dominant {}",
                e.valence(),
                e.arousal(),
                e.dominant().as_str().bold()
            );
        }
        Command::Topic { name, features } => {
            if let Some(evicted) = engine.add_topic(&name, features, 0.5) {
                println!("  {} topic '{}'", "evicted".yellow(), evicted);
            }
            match engine.focus_topic(&name) {
                Ok(()) => println!("  current topic: {}", name.bold()),
                Err(e) => println!("{} {}", "✗".red(), e),
            }
        }
        Command::Route { topic, payload } => match engine.route(&payload, &topic) {
            Ok(outcome) => {
                println!("  → {}", outcome.destination.bold());
                if let Some(output) = outcome.output {
                    println!("  {}", output);
                }
            }
            Err(e) => println!("{} {}", "undelivered:".yellow(), e),
        },
        Command::Event { event } => {
            let frame = engine.add_context_event(event);
            println!("  event recorded in {}", frame.bold());
        }
        Command::Decision { decision } => {
            let frame = engine.add_context_decision(decision);
            println!("  decision recorded in {}", frame.bold());
        }
        Command::Frames { count } => {
            for frame in engine.recent_context(count) {
                println!(
                    "  {:<10} {} events  {} decisions  importance {:.2}",
                    frame.id,
                    frame.content.events.len(),
                    frame.content.decisions.len(),
                    frame.content.importance
                );
            }
            match engine.context_trend() {
                Some(t) => println!(
                    "  trend: {} events, {} decisions over {:.0}s",
                    t.total_events, t.total_decisions, t.timespan_seconds
                ),
                None => println!("  no context frames"),
            }
        }
        Command::Consolidate => print_records(&engine.consolidate()),
        Command::Tick => match engine.tick() {
            Some(records) => print_records(&records),
            None => println!("  cycle {}", engine.status().counters.cycles),
        },
        Command::Snapshot { id, metric } => match engine.checkpoint(&id, metric) {
            Ok(info) => println!(
                "{} {} (parent: {})",
                "snapshot".green(),
                info.id.bold(),
                info.parent_id.as_deref().unwrap_or("-")
            ),
            Err(e) => println!("{} {}", "✗".red(), e),
        },
        Command::Rollback { id } => match engine.restore_checkpoint(&id) {
            Ok(()) => println!("{} {}", "rolled back to".green(), id.bold()),
            Err(e) => println!("{} {}", "✗".red(), e),
        },
        Command::Diff { from, to } => match engine.compare_snapshots(&from, &to) {
            Ok(delta) => {
                println!(
                    "  {} added, {} removed, {} changed over {:.0}s",
                    delta.added.len(),
                    delta.removed.len(),
                    delta.changed.len(),
                    delta.elapsed_seconds
                );
                if let Some(m) = delta.metric_delta {
                    println!("  metric {:+.4}", m);
                }
            }
            Err(e) => println!("{} {}", "✗".red(), e),
        },
        Command::Status => cmd_status(engine),
        Command::Save { path } => match save_state(engine, &path) {
            Ok(()) => println!("{} {}", "✓ State saved to".green(), path.display().to_string().bold()),
            Err(e) => println!("{}: {}", "Error saving state".red(), e),
        },
        Command::Load { path } => match load_state(engine, &path) {
            Ok(()) => println!("{} {}", "✓ State loaded from".green(), path.display().to_string().bold()),
            Err(e) => println!("{}: {}", "Error loading state".red(), e),
        },
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}

fn cmd_help() {
    println!();
    println!("{}", "engram Commands".bold().underline());
    for (usage, what) in [
        ("/store <priority> <text|json>", "ingest into working memory"),
        ("/get <id>", "retrieve from any tier"),
        ("/focus <modality> <target> [intensity]", "set attention"),
        ("/emotion <name> <intensity>", "update emotional state"),
        ("/topic <name> [feature=weight ...]", "add and focus a topic"),
        ("/route <topic> <json>", "dispatch a payload (topic 'echo' echoes)"),
        ("/event <text|json>", "record an event in the current frame"),
        ("/decision <text|json>", "record a decision in the current frame"),
        ("/frames [n]", "recent context frames and their trend"),
        ("/consolidate", "run both promotion hops now"),
        ("/tick", "advance one processing cycle"),
        ("/snapshot <id> [metric]", "checkpoint the engine's memory"),
        ("/rollback <id>", "restore a checkpoint"),
        ("/diff <from> <to>", "compare two checkpoints"),
        ("/status", "store utilisation and counters"),
        ("/save <path>  /load <path>", "export / import state as JSON"),
        ("/quit  /exit", "exit the shell"),
    ] {
        println!("  {:<40} – {}", usage.bold().cyan(), what);
    }
    println!();
}

fn cmd_status(engine: &MemoryCoordinator) {
    let status = engine.status();
    let c = status.counters;
    println!("{}", "Engine Status".bold().underline());
    println!(
        "  cycle {}  stored {}  retrieved {}  promoted {}  pruned {}",
        c.cycles, c.stored, c.retrieved, c.promoted, c.pruned
    );
    for store in &status.stores {
        let decay = store
            .decay_rate
            .map_or_else(|| "-".to_string(), |r| format!("{r}"));
        println!(
            "  {:<18} {:>5}/{:<5} {:>6.1}%  decay {}",
            store.name,
            store.size,
            store.capacity,
            store.utilization_percent(),
            decay
        );
    }
    if let Some(primary) = status.attention.primary {
        println!("  primary focus: {}", primary.to_string().bold());
    }
    println!(
        "  routing: {} routed, {} undelivered, {} failed ({:.0}% success)",
        status.routing.routed,
        status.routing.unrouted,
        status.routing.failed,
        status.routing.success_rate() * 100.0
    );
}

fn print_records(records: &[ConsolidationRecord]) {
    for r in records {
        let line = format!(
            "  {} → {}: {} promoted, {} pruned",
            r.source, r.destination, r.promoted, r.pruned
        );
        if r.is_noop() {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line.green());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn save_state(engine: &MemoryCoordinator, path: &Path) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(&engine.export_state())
        .map_err(|e| format!("failed to serialize state: {e}"))?;
    fs::write(path, raw).map_err(|e| format!("failed to write {}: {e}", path.display()))
}

fn load_state(engine: &mut MemoryCoordinator, path: &Path) -> Result<(), String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let state: EngineState = serde_json::from_str(&raw).map_err(|e| format!("failed to parse state: {e}"))?;
    engine.import_state(state).map_err(|e| e.to_string())
}

/// First whitespace-delimited word and the trimmed remainder.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

fn required<'a>(s: &'a str, usage: &str) -> Result<&'a str, String> {
    if s.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(s)
    }
}

fn parse_number(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{raw}' is not a number"))
}

fn json_or_text(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
