//! Activation core.
//!
//! Resolves what the user asked for into an [`Action`], applies it to the
//! [`SessionState`], and reports which proxy is active and which profile (if
//! any) it corresponds to.
//!
//! One invocation walks `Unknown -> Resolved -> Applied | Rejected`. Each step
//! runs once; nothing is retried.

use tracing::{debug, info};

use crate::error::Result;
use crate::profiles::ProfileStore;
use crate::state::{ProxyEnv, SessionState, proxy_url};

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Activate the named profile
    Profile(String),
    /// Disable the current proxy
    Disable,
}

/// A resolved request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Activate(String),
    Deactivate,
    NotFound(String),
}

/// Active HTTP/HTTPS proxy URLs as seen by this invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyStatus {
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyStatus {
    pub fn is_active(&self) -> bool {
        self.http.is_some()
    }
}

/// Per-invocation progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Unknown(Request),
    Resolved(Action),
    /// Terminal: the action mutated session state
    Applied(ProxyStatus),
    /// Terminal: the named profile does not exist, nothing changed
    Rejected(String),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Applied(_) | Phase::Rejected(_))
    }
}

/// Activation policy bound to one session and one profile store
pub struct ActivationCore<'a, E: ProxyEnv> {
    session: &'a mut SessionState<E>,
    store: ProfileStore<'a>,
    https_follows_persisted: bool,
}

impl<'a, E: ProxyEnv> ActivationCore<'a, E> {
    pub fn new(session: &'a mut SessionState<E>, store: ProfileStore<'a>) -> Self {
        Self {
            session,
            store,
            https_follows_persisted: false,
        }
    }

    /// Let HTTPS status fall back to the persisted address like HTTP does
    pub fn https_follows_persisted(mut self, enabled: bool) -> Self {
        self.https_follows_persisted = enabled;
        self
    }

    pub fn store(&self) -> &ProfileStore<'a> {
        &self.store
    }

    pub fn session(&self) -> &SessionState<E> {
        &*self.session
    }

    /// Resolve the active proxy
    ///
    /// HTTP prefers the live variable and falls back to the persisted address.
    /// HTTPS only reads the live variable unless `https_follows_persisted` is set.
    pub fn current_status(&self) -> Result<ProxyStatus> {
        let live_http = self.session.live_http();
        let live_https = self.session.live_https();

        let needs_persisted =
            live_http.is_none() || (self.https_follows_persisted && live_https.is_none());
        let persisted = if needs_persisted {
            self.session.load_persisted_address()?.map(|a| proxy_url(&a))
        } else {
            None
        };

        let http = live_http.or_else(|| persisted.clone());
        let https = if self.https_follows_persisted {
            live_https.or(persisted)
        } else {
            live_https
        };

        Ok(ProxyStatus { http, https })
    }

    /// Export and persist `address`, replacing any active proxy
    pub fn activate(&mut self, address: &str) -> Result<ProxyStatus> {
        self.session.apply_to_environment(address);
        self.session.save_active_address(address)?;
        info!(address, "proxy activated");
        self.current_status()
    }

    /// Clear the environment and the persisted record; safe to repeat
    pub fn deactivate(&mut self) -> Result<ProxyStatus> {
        self.session.clear_environment();
        self.session.clear_persisted_address()?;
        info!("proxy deactivated");
        self.current_status()
    }

    /// Turn a request into an action without touching session state
    pub fn resolve_selection(&self, request: &Request) -> Result<Action> {
        resolve_selection(request, &self.store)
    }

    /// Profile whose address backs the current HTTP status
    pub fn matching_profile(&self) -> Result<Option<String>> {
        let status = self.current_status()?;
        let profiles = self.store.read_all()?;
        Ok(find_matching_profile(status.http.as_deref(), &profiles).map(str::to_string))
    }

    /// Advance one phase
    pub fn step(&mut self, phase: Phase) -> Result<Phase> {
        let next = match phase {
            Phase::Unknown(request) => Phase::Resolved(self.resolve_selection(&request)?),
            Phase::Resolved(Action::Activate(address)) => Phase::Applied(self.activate(&address)?),
            Phase::Resolved(Action::Deactivate) => Phase::Applied(self.deactivate()?),
            Phase::Resolved(Action::NotFound(name)) => Phase::Rejected(name),
            terminal => terminal,
        };
        debug!(?next, "activation phase");
        Ok(next)
    }

    /// Drive a request to its terminal phase
    pub fn run(&mut self, request: Request) -> Result<Phase> {
        let mut phase = Phase::Unknown(request);
        while !phase.is_terminal() {
            phase = self.step(phase)?;
        }
        Ok(phase)
    }
}

/// Resolve a request against the profile store
pub fn resolve_selection(request: &Request, store: &ProfileStore<'_>) -> Result<Action> {
    let action = match request {
        Request::Disable => Action::Deactivate,
        Request::Profile(name) => match store.read_profile(name)? {
            Some(address) => Action::Activate(address),
            None => Action::NotFound(name.clone()),
        },
    };
    debug!(?request, ?action, "resolved selection");
    Ok(action)
}

/// First profile whose `http://<address>` equals `current_http`
///
/// `profiles` holds `(name, address)` pairs in enumeration order.
pub fn find_matching_profile<'p>(
    current_http: Option<&str>,
    profiles: &'p [(String, String)],
) -> Option<&'p str> {
    let current = current_http?;
    profiles
        .iter()
        .find(|(_, address)| proxy_url(address) == current)
        .map(|(name, _)| name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::Paths;
    use crate::state::{HTTP_PROXY_VAR, HTTPS_PROXY_VAR, MemoryEnv};
    use crate::test_utils::{setup_test_paths, write_profile};
    use tempfile::TempDir;

    fn seeded_paths(temp_dir: &TempDir) -> Paths {
        let paths = setup_test_paths(temp_dir);
        write_profile(&paths, "work", "10.0.0.1:8080");
        write_profile(&paths, "home", "10.0.0.2:3128");
        paths
    }

    fn pairs() -> Vec<(String, String)> {
        vec![
            ("work".to_string(), "10.0.0.1:8080".to_string()),
            ("home".to_string(), "10.0.0.2:3128".to_string()),
        ]
    }

    #[test]
    fn test_activate_then_status() {
        let temp_dir = TempDir::new().unwrap();
        let paths = seeded_paths(&temp_dir);
        let mut session = SessionState::with_env(&paths, MemoryEnv::new());
        let mut core = ActivationCore::new(&mut session, ProfileStore::new(&paths));

        let status = core.activate("10.0.0.2:3128").unwrap();
        assert_eq!(status.http.as_deref(), Some("http://10.0.0.2:3128"));
        assert_eq!(status.https.as_deref(), Some("http://10.0.0.2:3128"));
        assert_eq!(
            core.session().load_persisted_address().unwrap().as_deref(),
            Some("10.0.0.2:3128")
        );
    }

    #[test]
    fn test_deactivate_twice() {
        let temp_dir = TempDir::new().unwrap();
        let paths = seeded_paths(&temp_dir);
        let mut session = SessionState::with_env(&paths, MemoryEnv::new());
        let mut core = ActivationCore::new(&mut session, ProfileStore::new(&paths));

        core.activate("10.0.0.1:8080").unwrap();
        let once = core.deactivate().unwrap();
        let twice = core.deactivate().unwrap();

        assert_eq!(once, ProxyStatus::default());
        assert_eq!(once, twice);
        assert_eq!(core.session().load_persisted_address().unwrap(), None);
    }

    #[test]
    fn test_restart_keeps_http_but_not_https() {
        let temp_dir = TempDir::new().unwrap();
        let paths = seeded_paths(&temp_dir);
        {
            let mut session = SessionState::with_env(&paths, MemoryEnv::new());
            ActivationCore::new(&mut session, ProfileStore::new(&paths))
                .activate("10.0.0.1:8080")
                .unwrap();
        }

        // Fresh process: empty environment, persisted file intact
        let mut session = SessionState::with_env(&paths, MemoryEnv::new());
        assert_eq!(
            session.load_persisted_address().unwrap().as_deref(),
            Some("10.0.0.1:8080")
        );
        let core = ActivationCore::new(&mut session, ProfileStore::new(&paths));
        let status = core.current_status().unwrap();
        assert_eq!(status.http.as_deref(), Some("http://10.0.0.1:8080"));
        assert_eq!(status.https, None);
    }

    #[test]
    fn test_https_follows_persisted_when_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let paths = seeded_paths(&temp_dir);
        let mut session = SessionState::with_env(&paths, MemoryEnv::new());
        session.save_active_address("10.0.0.1:8080").unwrap();

        let core = ActivationCore::new(&mut session, ProfileStore::new(&paths))
            .https_follows_persisted(true);
        let status = core.current_status().unwrap();
        assert_eq!(status.https.as_deref(), Some("http://10.0.0.1:8080"));
    }

    #[test]
    fn test_live_env_wins_over_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let paths = seeded_paths(&temp_dir);
        let env = MemoryEnv::new()
            .with_var(HTTP_PROXY_VAR, "http://192.168.1.1:3128")
            .with_var(HTTPS_PROXY_VAR, "http://192.168.1.1:3129");
        let mut session = SessionState::with_env(&paths, env);
        session.save_active_address("10.0.0.1:8080").unwrap();

        let core = ActivationCore::new(&mut session, ProfileStore::new(&paths));
        let status = core.current_status().unwrap();
        assert_eq!(status.http.as_deref(), Some("http://192.168.1.1:3128"));
        assert_eq!(status.https.as_deref(), Some("http://192.168.1.1:3129"));
        assert_eq!(core.matching_profile().unwrap(), None);
    }

    #[test]
    fn test_find_matching_profile() {
        let profiles = pairs();
        assert_eq!(find_matching_profile(None, &profiles), None);
        assert_eq!(
            find_matching_profile(Some("http://10.0.0.1:8080"), &profiles),
            Some("work")
        );
        assert_eq!(
            find_matching_profile(Some("http://10.0.0.9:8080"), &profiles),
            None
        );
        // Raw address without scheme never matches
        assert_eq!(find_matching_profile(Some("10.0.0.1:8080"), &profiles), None);
    }

    #[test]
    fn test_find_matching_profile_first_wins() {
        let profiles = vec![
            ("alpha".to_string(), "10.0.0.1:8080".to_string()),
            ("beta".to_string(), "10.0.0.1:8080".to_string()),
        ];
        assert_eq!(
            find_matching_profile(Some("http://10.0.0.1:8080"), &profiles),
            Some("alpha")
        );
    }

    #[test]
    fn test_resolve_selection() {
        let temp_dir = TempDir::new().unwrap();
        let paths = seeded_paths(&temp_dir);
        let store = ProfileStore::new(&paths);

        assert_eq!(
            resolve_selection(&Request::Profile("work".to_string()), &store).unwrap(),
            Action::Activate("10.0.0.1:8080".to_string())
        );
        assert_eq!(
            resolve_selection(&Request::Disable, &store).unwrap(),
            Action::Deactivate
        );
        assert_eq!(
            resolve_selection(&Request::Profile("vpn".to_string()), &store).unwrap(),
            Action::NotFound("vpn".to_string())
        );
    }

    #[test]
    fn test_run_work_profile() {
        let temp_dir = TempDir::new().unwrap();
        let paths = seeded_paths(&temp_dir);
        let mut session = SessionState::with_env(&paths, MemoryEnv::new());
        let mut core = ActivationCore::new(&mut session, ProfileStore::new(&paths));

        let phase = core.run(Request::Profile("work".to_string())).unwrap();
        match phase {
            Phase::Applied(status) => {
                assert_eq!(status.http.as_deref(), Some("http://10.0.0.1:8080"))
            }
            other => panic!("unexpected phase: {other:?}"),
        }
        assert_eq!(core.matching_profile().unwrap().as_deref(), Some("work"));
        assert_eq!(
            std::fs::read_to_string(&paths.active_file).unwrap(),
            "10.0.0.1:8080"
        );
    }

    #[test]
    fn test_run_unknown_profile_changes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let paths = seeded_paths(&temp_dir);
        let mut session = SessionState::with_env(&paths, MemoryEnv::new());
        let mut core = ActivationCore::new(&mut session, ProfileStore::new(&paths));
        core.activate("10.0.0.2:3128").unwrap();
        let before = core.current_status().unwrap();

        let phase = core.run(Request::Profile("vpn".to_string())).unwrap();
        assert_eq!(phase, Phase::Rejected("vpn".to_string()));
        assert_eq!(core.current_status().unwrap(), before);
        assert_eq!(
            core.session().load_persisted_address().unwrap().as_deref(),
            Some("10.0.0.2:3128")
        );
    }

    #[test]
    fn test_step_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let paths = seeded_paths(&temp_dir);
        let mut session = SessionState::with_env(&paths, MemoryEnv::new());
        let mut core = ActivationCore::new(&mut session, ProfileStore::new(&paths));

        let resolved = core.step(Phase::Unknown(Request::Disable)).unwrap();
        assert_eq!(resolved, Phase::Resolved(Action::Deactivate));
        assert!(!resolved.is_terminal());

        let applied = core.step(resolved).unwrap();
        assert_eq!(applied, Phase::Applied(ProxyStatus::default()));

        // Terminal phases stay put
        assert_eq!(core.step(applied.clone()).unwrap(), applied);
    }
}
