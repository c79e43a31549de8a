// ABOUTME: Metric names recorded by the pipeline through the `metrics` facade
// ABOUTME: No recorder is installed here; the host decides whether to export them

pub const IDENTITY_CACHE_HITS_TOTAL: &str = "slackbot_identity_cache_hits_total";
pub const IDENTITY_CACHE_MISSES_TOTAL: &str = "slackbot_identity_cache_misses_total";
pub const IDENTITY_LOOKUP_FAILURES_TOTAL: &str = "slackbot_identity_lookup_failures_total";
pub const EVENTS_EMITTED_TOTAL: &str = "slackbot_events_emitted_total";
pub const MENTIONS_UNRESOLVED_TOTAL: &str = "slackbot_mentions_unresolved_total";
pub const MESSAGES_SENT_TOTAL: &str = "slackbot_messages_sent_total";
pub const MESSAGES_SEND_FAILURES_TOTAL: &str = "slackbot_messages_send_failures_total";
