//! Live client session metrics.

use std::collections::HashMap;

use crate::counter::Counter;
use crate::metric::{InfoData, InfoDescription, MetricType};
use crate::provider::Provider;

/// Section name of the session metrics.
pub const SECTION: &str = "sessions";

/// One connected client session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: String,
    /// Logged-in user, `None` for anonymous sessions.
    pub user_id: Option<String>,
    /// Name of every active subscription, one entry per subscription.
    pub subscriptions: Vec<String>,
    /// Documents published to the client, as `(collection, count)` pairs.
    pub documents: Vec<(String, u64)>,
}

/// Read-only view of the server's session table.
pub trait SessionRegistry: Send + Sync {
    fn sessions(&self) -> Vec<SessionSnapshot>;
}

impl<F> SessionRegistry for F
where
    F: Fn() -> Vec<SessionSnapshot> + Send + Sync,
{
    fn sessions(&self) -> Vec<SessionSnapshot> {
        self()
    }
}

pub struct SessionProvider<R> {
    registry: R,
}

impl<R: SessionRegistry> SessionProvider<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }
}

impl<R: SessionRegistry> Provider for SessionProvider<R> {
    fn name(&self) -> &str {
        SECTION
    }

    fn describe(&self) -> InfoDescription {
        InfoDescription::new()
            .metric("nSessions", MetricType::Integer, "Sessions")
            .metric("nSubs", MetricType::Counter, "Subscriptions[]")
            .metric("usersWithNSessions", MetricType::Counter, "Users with N sessions[]")
            .metric("nDocuments", MetricType::Counter, "Published documents[]")
    }

    fn collect(&self) -> InfoData {
        let sessions = self.registry.sessions();

        let mut subs = Counter::new();
        let mut documents = Counter::new();
        let mut per_user: HashMap<&str, u64> = HashMap::new();
        for session in &sessions {
            subs.extend(session.subscriptions.iter());
            for (collection, count) in &session.documents {
                documents.increment_by(collection, *count);
            }
            if let Some(user) = session.user_id.as_deref() {
                *per_user.entry(user).or_default() += 1;
            }
        }

        // Histogram keyed by session count, ascending for a stable output.
        let mut counts: Vec<u64> = per_user.into_values().collect();
        counts.sort_unstable();
        let users_with_n: Counter = counts.into_iter().collect();

        InfoData::new()
            .with("nSessions", sessions.len())
            .with("nSubs", subs)
            .with("usersWithNSessions", users_with_n)
            .with("nDocuments", documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::reduce;
    use serde_json::{Value, json};

    fn session(id: &str, user: Option<&str>, subs: &[&str]) -> SessionSnapshot {
        SessionSnapshot {
            id: id.to_string(),
            user_id: user.map(str::to_string),
            subscriptions: subs.iter().map(|s| s.to_string()).collect(),
            documents: Vec::new(),
        }
    }

    fn collect_json(sessions: Vec<SessionSnapshot>) -> Value {
        let provider = SessionProvider::new(move || sessions.clone());
        Value::Object(reduce(SECTION, provider.collect()))
    }

    #[test]
    fn empty_table() {
        assert_eq!(
            collect_json(Vec::new()),
            json!({
                "nSessions": 0,
                "nSubs": {},
                "usersWithNSessions": {},
                "nDocuments": {},
            })
        );
    }

    #[test]
    fn counts_subscriptions_by_name() {
        let out = collect_json(vec![
            session("a", None, &["posts", "comments"]),
            session("b", None, &["posts"]),
        ]);
        assert_eq!(out["nSessions"], json!(2));
        assert_eq!(out["nSubs"], json!({ "posts": 2, "comments": 1 }));
    }

    #[test]
    fn users_with_n_sessions_skips_anonymous() {
        let out = collect_json(vec![
            session("1", Some("alice"), &[]),
            session("2", Some("alice"), &[]),
            session("3", Some("bob"), &[]),
            session("4", Some("carol"), &[]),
            session("5", None, &[]),
        ]);
        assert_eq!(out["usersWithNSessions"], json!({ "1": 2, "2": 1 }));
    }

    #[test]
    fn documents_summed_per_collection() {
        let mut a = session("a", None, &[]);
        a.documents = vec![("posts".into(), 10), ("users".into(), 1)];
        let mut b = session("b", None, &[]);
        b.documents = vec![("posts".into(), 5)];
        let out = collect_json(vec![a, b]);
        assert_eq!(out["nDocuments"], json!({ "posts": 15, "users": 1 }));
    }

    #[test]
    fn description_matches_collected_metrics() {
        let provider = SessionProvider::new(Vec::<SessionSnapshot>::new);
        let described: Vec<String> = provider.describe().names().map(str::to_string).collect();
        let collected: Vec<String> = provider.collect().names().map(str::to_string).collect();
        assert_eq!(described, collected);
    }
}
