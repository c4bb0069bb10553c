use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use price_notifier::subscribers::{PassThroughObserver, SimulatedNotifier, ThresholdRule};
use price_notifier::{
    parse_price, EntryKind, Price, PriceNotifier, Registration, SubscriberHandle, Symbol,
};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// One parsed line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { symbol: Symbol, price: Price },
    Price { symbol: Symbol, price: Price },
    Quote { symbol: Symbol },
    Symbols,
    NewObserver { name: String },
    NewNotifier { name: String, channel: String },
    NewRule { name: String },
    Rule { name: String, symbol: Symbol, buy_below: Price, sell_above: Price },
    Sub { name: String, symbol: Symbol },
    Unsub { name: String, symbol: Symbol },
    Subscribers { symbol: Symbol },
    Report,
    Log,
    Stats,
    Channel { name: String, online: bool },
    Wait { timeout: Duration },
    Help,
    Quit,
}

/// Parse a line; blank lines and `#` comments yield `None`
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Ok(None);
    };
    if first.starts_with('#') {
        return Ok(None);
    }

    let args = &parts[1..];
    let command = match (first.to_lowercase().as_str(), args) {
        ("add", [symbol, price]) => {
            Command::Add { symbol: symbol.parse()?, price: parse_price(price)? }
        }
        ("price", [symbol, price]) => {
            Command::Price { symbol: symbol.parse()?, price: parse_price(price)? }
        }
        ("quote", [symbol]) => Command::Quote { symbol: symbol.parse()? },
        ("symbols", []) => Command::Symbols,
        ("new", ["observer", name]) => Command::NewObserver { name: name.to_string() },
        ("new", ["notifier", name, channel]) => {
            Command::NewNotifier { name: name.to_string(), channel: channel.to_string() }
        }
        ("new", ["rule", name]) => Command::NewRule { name: name.to_string() },
        ("rule", [name, symbol, buy_below, sell_above]) => Command::Rule {
            name: name.to_string(),
            symbol: symbol.parse()?,
            buy_below: parse_price(buy_below)?,
            sell_above: parse_price(sell_above)?,
        },
        ("sub", [name, symbol]) => Command::Sub { name: name.to_string(), symbol: symbol.parse()? },
        ("unsub", [name, symbol]) => {
            Command::Unsub { name: name.to_string(), symbol: symbol.parse()? }
        }
        ("subscribers", [symbol]) => Command::Subscribers { symbol: symbol.parse()? },
        ("report", []) => Command::Report,
        ("log", []) => Command::Log,
        ("stats", []) => Command::Stats,
        ("channel", [name, state]) => {
            let online = match state.to_lowercase().as_str() {
                "on" | "online" => true,
                "off" | "offline" => false,
                other => bail!("Channel state must be 'on' or 'off', got '{other}'"),
            };
            Command::Channel { name: name.to_string(), online }
        }
        ("wait", []) => Command::Wait { timeout: DEFAULT_WAIT },
        ("wait", [ms]) => {
            let ms: u64 = ms.parse().with_context(|| format!("Invalid wait time: {ms}"))?;
            Command::Wait { timeout: Duration::from_millis(ms) }
        }
        ("help" | "h" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        (word, _) => bail!("Unknown command or wrong arguments: '{word}'. Type 'help'."),
    };

    Ok(Some(command))
}

/// A subscriber created at the prompt, kept so its details stay inspectable
enum SubscriberKind {
    Observer(Arc<PassThroughObserver>),
    Notifier(Arc<SimulatedNotifier>),
    Rule(Arc<ThresholdRule>),
}

struct NamedSubscriber {
    handle: SubscriberHandle,
    kind: SubscriberKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct InteractiveCLI {
    notifier: PriceNotifier,
    subscribers: BTreeMap<String, NamedSubscriber>,
}

impl InteractiveCLI {
    pub fn new(notifier: PriceNotifier) -> Self {
        Self { notifier, subscribers: BTreeMap::new() }
    }

    /// Read and execute commands until `quit` or end of input
    ///
    /// Prompts are shown only when `interactive`; otherwise each line is echoed.
    pub fn run<R: BufRead>(&mut self, input: R, interactive: bool) -> Result<()> {
        if interactive {
            show_welcome();
        }

        let mut lines = input.lines();
        loop {
            if interactive {
                print!("{}", "notifier> ".cyan().bold());
                io::stdout().flush()?;
            }

            let Some(line) = lines.next() else {
                break;
            };
            let line = match line {
                Ok(line) => line,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    println!("{} {}", "❌".red(), "Input line is not valid UTF-8".red());
                    continue;
                }
                Err(e) => {
                    println!("{} {}", "❌".red(), format!("Failed to read input: {e}").red());
                    break;
                }
            };
            if !interactive && !line.trim().is_empty() {
                println!("{} {}", ">".dimmed(), line.trim());
            }

            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{} {}", "❌".red(), e.to_string().red());
                    continue;
                }
            };

            match self.execute(command) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(e) => println!("{} {}", "❌".red(), e.to_string().red()),
            }
        }

        self.finish();
        Ok(())
    }

    fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Add { symbol, price } => {
                let existed = self.notifier.has_instrument(&symbol);
                self.notifier.add_instrument(symbol.clone(), price)?;
                let verb = if existed { "reset to" } else { "added at" };
                println!("{} {} {} {}", "✅".green(), symbol.as_str().bold(), verb, price);
            }
            Command::Price { symbol, price } => {
                let update = self.notifier.update_price(&symbol, price)?;
                println!(
                    "{} {}: {} -> {} ({} delivery(ies) scheduled)",
                    "📈".green(),
                    update.symbol.as_str().bold(),
                    update.old_price,
                    update.new_price,
                    update.deliveries_scheduled
                );
            }
            Command::Quote { symbol } => match self.notifier.price(&symbol) {
                Some(price) => println!("{} {}", symbol.as_str().bold(), price),
                None => bail!("Unknown symbol {symbol}"),
            },
            Command::Symbols => self.show_symbols(),
            Command::NewObserver { name } => {
                let observer = Arc::new(PassThroughObserver::new());
                let handle = SubscriberHandle::from_arc(name.clone(), observer.clone());
                self.insert_subscriber(name, handle, SubscriberKind::Observer(observer))?;
            }
            Command::NewNotifier { name, channel } => {
                let notifier = Arc::new(SimulatedNotifier::new(channel));
                let handle = SubscriberHandle::from_arc(name.clone(), notifier.clone());
                self.insert_subscriber(name, handle, SubscriberKind::Notifier(notifier))?;
            }
            Command::NewRule { name } => {
                let rule = Arc::new(ThresholdRule::new());
                let handle = SubscriberHandle::from_arc(name.clone(), rule.clone());
                self.insert_subscriber(name, handle, SubscriberKind::Rule(rule))?;
            }
            Command::Rule { name, symbol, buy_below, sell_above } => {
                let rule = match &self.lookup(&name)?.kind {
                    SubscriberKind::Rule(rule) => rule.clone(),
                    _ => bail!("'{name}' is not a rule"),
                };
                rule.set_thresholds(symbol.clone(), buy_below, sell_above)?;
                println!(
                    "{} '{}' on {}: buy below {}, sell above {}",
                    "✅".green(),
                    name,
                    symbol.as_str().bold(),
                    buy_below,
                    sell_above
                );
            }
            Command::Sub { name, symbol } => {
                let handle = self.lookup(&name)?.handle.clone();
                match self.notifier.register(&symbol, &handle)? {
                    Registration::Added => {
                        println!("{} '{}' subscribed to {}", "✅".green(), name, symbol.as_str().bold())
                    }
                    Registration::AlreadyRegistered => println!(
                        "{} '{}' is already subscribed to {}",
                        "ℹ️".yellow(),
                        name,
                        symbol.as_str().bold()
                    ),
                }
            }
            Command::Unsub { name, symbol } => {
                // The registry is authoritative for what is subscribed under a name
                let handle = match self.notifier.find_by_name(&symbol, &name) {
                    Some(handle) => handle,
                    None => self.lookup(&name)?.handle.clone(),
                };
                if self.notifier.remove(&symbol, &handle)? {
                    println!("{} '{}' unsubscribed from {}", "✅".green(), name, symbol.as_str().bold());
                } else {
                    println!("{} '{}' was not subscribed to {}", "ℹ️".yellow(), name, symbol.as_str().bold());
                }
            }
            Command::Subscribers { symbol } => self.show_subscribers(&symbol)?,
            Command::Report => self.show_report(),
            Command::Log => self.show_log(),
            Command::Stats => self.show_stats(),
            Command::Channel { name, online } => {
                let channel = match &self.lookup(&name)?.kind {
                    SubscriberKind::Notifier(notifier) => notifier.clone(),
                    _ => bail!("'{name}' is not a notifier"),
                };
                channel.set_online(online);
                let state = if online { "online".green() } else { "offline".red() };
                println!("{} channel '{}' is now {}", "🔌", channel.channel(), state);
            }
            Command::Wait { timeout } => {
                if self.notifier.wait_idle(timeout) {
                    println!("{} all deliveries finished", "✅".green());
                } else {
                    println!(
                        "{} {} delivery(ies) still in flight",
                        "⏳".yellow(),
                        self.notifier.stats().deliveries_in_flight
                    );
                }
            }
            Command::Help => print_help(),
            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    fn insert_subscriber(
        &mut self,
        name: String,
        handle: SubscriberHandle,
        kind: SubscriberKind,
    ) -> Result<()> {
        if self.subscribers.contains_key(&name) {
            bail!("Subscriber '{name}' already exists");
        }
        println!("{} created {} '{}'", "✅".green(), kind_label(&kind), name);
        self.subscribers.insert(name, NamedSubscriber { handle, kind });
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&NamedSubscriber> {
        self.subscribers
            .get(name)
            .ok_or_else(|| anyhow!("No subscriber named '{name}'. Create one with 'new'."))
    }

    fn show_symbols(&self) {
        let symbols = self.notifier.list_symbols();
        if symbols.is_empty() {
            println!("{}", "No instruments yet. Use 'add <SYM> <PRICE>'.".yellow());
            return;
        }
        for symbol in symbols {
            if let Some(price) = self.notifier.price(&symbol) {
                println!("  {:<12} {}", symbol.as_str().bold(), price);
            }
        }
    }

    fn show_subscribers(&self, symbol: &Symbol) -> Result<()> {
        if !self.notifier.has_instrument(symbol) {
            bail!("Unknown symbol {symbol}");
        }

        let handles = self.notifier.subscribers(symbol);
        if handles.is_empty() {
            println!("{} has no subscribers", symbol.as_str().bold());
        }
        for handle in handles {
            println!("  {:<16} {} delivered", handle.name(), handle.delivery_count());
        }
        Ok(())
    }

    fn show_report(&self) {
        println!("{}", "📊 Subscriptions".blue().bold());
        for entry in self.notifier.subscribers_report() {
            let names: Vec<String> = entry
                .subscribers
                .iter()
                .map(|s| format!("{} ({})", s.name, s.deliveries))
                .collect();
            let listing = if names.is_empty() { "-".dimmed().to_string() } else { names.join(", ") };
            println!("  {:<12} {}", entry.symbol.as_str().bold(), listing);
        }

        if self.subscribers.is_empty() {
            return;
        }

        println!("{}", "🧩 Subscribers".blue().bold());
        for (name, subscriber) in &self.subscribers {
            let detail = match &subscriber.kind {
                SubscriberKind::Observer(observer) => {
                    format!("{} receipt(s)", observer.receipt_count())
                }
                SubscriberKind::Notifier(notifier) => format!(
                    "channel {} ({}), {} sent",
                    notifier.channel(),
                    if notifier.is_online() { "online" } else { "offline" },
                    notifier.sent_messages().len()
                ),
                SubscriberKind::Rule(rule) => {
                    let signals: Vec<String> = self
                        .notifier
                        .list_symbols()
                        .iter()
                        .filter_map(|symbol| {
                            rule.last_signal(symbol).map(|signal| format!("{symbol}={signal}"))
                        })
                        .collect();
                    if signals.is_empty() {
                        "no signals yet".to_string()
                    } else {
                        format!("last signals {}", signals.join(" "))
                    }
                }
            };
            println!(
                "  {:<16} {:<9} {}",
                name.bold(),
                kind_label(&subscriber.kind),
                detail
            );
        }
    }

    fn show_log(&self) {
        for entry in self.notifier.dump_log() {
            let line = entry.to_string();
            match entry.kind {
                EntryKind::Info => println!("{line}"),
                EntryKind::Rejected => println!("{}", line.yellow()),
                EntryKind::Failure => println!("{}", line.red()),
            }
        }
    }

    fn show_stats(&self) {
        let stats = self.notifier.stats();
        let metrics = self.notifier.metrics();

        println!("{}", "📈 Engine statistics".blue().bold());
        println!("  Instruments:          {}", stats.instruments);
        println!("  Subscriptions:        {}", stats.subscriptions);
        println!("  Log entries:          {}", stats.log_entries);
        println!("  Updates accepted:     {}", metrics.updates_total);
        println!("  Updates rejected:     {}", metrics.updates_rejected_total);
        println!("  Deliveries ok/failed: {}/{}", metrics.deliveries_succeeded_total, metrics.deliveries_failed_total);
        println!("  In flight:            {}", stats.deliveries_in_flight);
        println!("  Latency p99:          {}µs", metrics.delivery_latency_p99_us);
        println!("  Health:               {}/100", metrics.system_health);
        println!("  Uptime:               {:.1}s", stats.uptime.as_secs_f64());
    }

    fn finish(&self) {
        if self.notifier.shutdown() {
            println!("👋 Goodbye!");
        } else {
            println!(
                "{} exiting with {} delivery(ies) unfinished",
                "⚠️".yellow(),
                self.notifier.stats().deliveries_in_flight
            );
        }
    }
}

fn kind_label(kind: &SubscriberKind) -> &'static str {
    match kind {
        SubscriberKind::Observer(_) => "observer",
        SubscriberKind::Notifier(_) => "notifier",
        SubscriberKind::Rule(_) => "rule",
    }
}

fn show_welcome() {
    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════════╗".cyan());
    println!("{}", "║                     🔔 PRICE NOTIFIER                        ║".cyan());
    println!("{}", "║            Instrument prices, live subscriber fanout         ║".cyan());
    println!("{}", "╚══════════════════════════════════════════════════════════════╝".cyan());
    println!("{}", "Type 'help' for available commands".yellow());
    println!();
}

fn print_help() {
    println!("{}", "Instruments:".yellow().bold());
    println!("  add <SYM> <PRICE>                      - Add an instrument or reset its price");
    println!("  price <SYM> <PRICE>                    - Update a price and notify subscribers");
    println!("  quote <SYM>                            - Show the current price");
    println!("  symbols                                - List instruments");
    println!("{}", "Subscribers:".yellow().bold());
    println!("  new observer <NAME>                    - Record every notification");
    println!("  new notifier <NAME> <CHANNEL>          - Simulated alert channel");
    println!("  new rule <NAME>                        - Buy/sell threshold rule");
    println!("  rule <NAME> <SYM> <BUY_BELOW> <SELL_ABOVE> - Set rule thresholds");
    println!("  channel <NAME> on|off                  - Bring a notifier channel up or down");
    println!("  sub <NAME> <SYM> / unsub <NAME> <SYM>  - Manage subscriptions");
    println!("{}", "Inspection:".yellow().bold());
    println!("  subscribers <SYM>                      - Subscribers of one instrument");
    println!("  report                                 - All subscriptions and subscriber state");
    println!("  log                                    - Full audit log");
    println!("  stats                                  - Engine statistics");
    println!("  wait [MS]                              - Wait for deliveries to finish");
    println!("  help / quit");
}
