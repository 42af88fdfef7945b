/// Subsystem tags attached to every log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Dispatcher,
    Provider,
    Scheduler,
    Rarity,
    Store,
    Cache,
    Webserver,
}

impl LogTag {
    /// Upper-case label used in output
    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Dispatcher => "DISPATCH",
            LogTag::Provider => "PROVIDER",
            LogTag::Scheduler => "SCHEDULER",
            LogTag::Rarity => "RARITY",
            LogTag::Store => "STORE",
            LogTag::Cache => "CACHE",
            LogTag::Webserver => "WEB",
        }
    }

    /// Key accepted by `--debug <key>`
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Dispatcher => "dispatcher",
            LogTag::Provider => "provider",
            LogTag::Scheduler => "scheduler",
            LogTag::Rarity => "rarity",
            LogTag::Store => "store",
            LogTag::Cache => "cache",
            LogTag::Webserver => "webserver",
        }
        .to_string()
    }
}
