use super::{AppLauncher, LaunchableApp, UsageGranularity, UsageRecord, UsageStats};
use crate::clock::now_millis;
use crate::db::safe_lock;
use crate::error::{LaunchError, PlatformError};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ClientMessageEvent, ConnectionExt, EventMask, Window};
use x11rb::rust_connection::RustConnection;

/// `_NET_ACTIVE_WINDOW` source indication for pagers; window managers honour
/// it even with focus-stealing prevention enabled.
const SOURCE_INDICATION_PAGER: u32 = 2;

fn query_failed(e: impl std::fmt::Display) -> PlatformError {
    PlatformError::QueryFailed(e.to_string())
}

/// Connection to the X server, shared by the usage and launcher backends.
pub struct X11Session {
    conn: Option<RustConnection>,
    root: Window,
}

impl Default for X11Session {
    fn default() -> Self {
        Self::connect()
    }
}

impl X11Session {
    /// Connect to `$DISPLAY`. Without an X server the session stays
    /// disconnected and every query comes back empty.
    pub fn connect() -> Self {
        match x11rb::connect(None) {
            Ok((conn, screen_num)) => {
                let Some(root) = conn.setup().roots.get(screen_num).map(|s| s.root) else {
                    warn!("Invalid screen number {screen_num}. Window tracking disabled.");
                    return Self { conn: None, root: 0 };
                };
                Self {
                    conn: Some(conn),
                    root,
                }
            }
            Err(e) => {
                warn!("Failed to connect to X server: {e}. Window tracking disabled.");
                Self { conn: None, root: 0 }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn get_atom(&self, name: &str) -> Option<u32> {
        self.conn
            .as_ref()?
            .intern_atom(false, name.as_bytes())
            .ok()?
            .reply()
            .ok()
            .map(|r| r.atom)
    }

    fn get_window_property(&self, window: Window, atom: u32) -> Option<String> {
        let reply = self
            .conn
            .as_ref()?
            .get_property(false, window, atom, AtomEnum::ANY, 0, 1024)
            .ok()?
            .reply()
            .ok()?;

        if reply.value.is_empty() {
            return None;
        }

        String::from_utf8(reply.value).ok()
    }

    fn get_root_windows(&self, name: &str, max_len: u32) -> Vec<Window> {
        let Some(conn) = self.conn.as_ref() else {
            return Vec::new();
        };
        let Some(atom) = self.get_atom(name) else {
            return Vec::new();
        };

        let Some(reply) = conn
            .get_property(false, self.root, atom, AtomEnum::WINDOW, 0, max_len)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
        else {
            return Vec::new();
        };

        let windows: Vec<Window> = reply.value32().map(Iterator::collect).unwrap_or_default();
        windows
    }

    fn active_window_id(&self) -> Option<Window> {
        self.get_root_windows("_NET_ACTIVE_WINDOW", 1)
            .into_iter()
            .find(|&w| w != 0)
    }

    /// `WM_CLASS` as `(instance, class)`.
    fn window_class(&self, window: Window) -> Option<(String, String)> {
        let raw = self.get_window_property(window, AtomEnum::WM_CLASS.into())?;
        let mut parts = raw.split('\0').filter(|p| !p.is_empty());
        let instance = parts.next()?.to_string();
        let class = parts.next().map_or_else(|| instance.clone(), str::to_string);
        Some((instance, class))
    }

    pub fn active_app(&self) -> Option<String> {
        let window = self.active_window_id()?;
        self.window_class(window).map(|(instance, _)| instance)
    }

    fn client_windows(&self) -> Vec<Window> {
        self.get_root_windows("_NET_CLIENT_LIST", 4096)
    }

    fn find_window_for(&self, package: &str) -> Option<Window> {
        self.client_windows().into_iter().find(|&w| {
            self.window_class(w).is_some_and(|(instance, class)| {
                instance == package || class.eq_ignore_ascii_case(package)
            })
        })
    }

    fn activate(&self, window: Window) -> Result<(), PlatformError> {
        let conn = self.conn.as_ref().ok_or(PlatformError::Unsupported {
            operation: "activate_window",
        })?;
        let atom = self
            .get_atom("_NET_ACTIVE_WINDOW")
            .ok_or_else(|| query_failed("_NET_ACTIVE_WINDOW atom unavailable"))?;

        let event = ClientMessageEvent::new(
            32,
            window,
            atom,
            [SOURCE_INDICATION_PAGER, x11rb::CURRENT_TIME, 0, 0, 0],
        );
        conn.send_event(
            false,
            self.root,
            EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
            event,
        )
        .map_err(query_failed)?;
        conn.flush().map_err(query_failed)?;
        Ok(())
    }
}

/// Usage stats assembled by sampling the active window's class on each query.
pub struct X11UsageStats {
    session: X11Session,
    last_seen: Mutex<HashMap<String, i64>>,
}

impl Default for X11UsageStats {
    fn default() -> Self {
        Self::new()
    }
}

impl X11UsageStats {
    pub fn new() -> Self {
        Self {
            session: X11Session::connect(),
            last_seen: Mutex::new(HashMap::new()),
        }
    }
}

impl UsageStats for X11UsageStats {
    fn query_usage_stats(
        &self,
        _granularity: UsageGranularity,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<UsageRecord>, PlatformError> {
        if !self.session.is_connected() {
            return Ok(Vec::new());
        }

        let mut last_seen = safe_lock(&self.last_seen, "X11 usage table");
        if let Some(app) = self.session.active_app() {
            last_seen.insert(app, now_millis());
        }

        Ok(last_seen
            .iter()
            .filter(|&(_, &t)| (start_ms..=end_ms).contains(&t))
            .map(|(package, &t)| UsageRecord::new(package, t))
            .collect())
    }
}

/// Launcher that raises an existing window of the target, or starts it.
pub struct X11Launcher {
    session: X11Session,
    /// Programs started by this launcher, keyed by package, until reaped.
    spawned: Mutex<Vec<(String, Child)>>,
}

impl Default for X11Launcher {
    fn default() -> Self {
        Self::new()
    }
}

impl X11Launcher {
    pub fn new() -> Self {
        Self {
            session: X11Session::connect(),
            spawned: Mutex::new(Vec::new()),
        }
    }

    fn spawn(&self, package: &str) -> Result<(), LaunchError> {
        let mut spawned = safe_lock(&self.spawned, "X11 launcher");
        reap_exited(&mut spawned);

        // A previous launch that is still starting up counts as in progress
        if let Some((_, child)) = spawned.iter().find(|(running, _)| running == package) {
            debug!("Launch of '{package}' still in progress (pid {})", child.id());
            return Ok(());
        }

        let child = Command::new(package)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                debug!("Spawning '{package}' failed: {e}");
                LaunchError::NotLaunchable {
                    package: package.to_string(),
                }
            })?;
        info!("Started '{package}' (pid {})", child.id());
        spawned.push((package.to_string(), child));
        Ok(())
    }
}

/// Drop children that have exited, collecting their exit status.
fn reap_exited(children: &mut Vec<(String, Child)>) {
    children.retain_mut(|(package, child)| match child.try_wait() {
        Ok(Some(status)) => {
            debug!("'{package}' exited ({status})");
            false
        }
        Ok(None) => true,
        Err(e) => {
            warn!("Could not poll '{package}': {e}");
            false
        }
    });
}

impl AppLauncher for X11Launcher {
    fn launch_with_focus(&self, package: &str) -> Result<(), LaunchError> {
        match self.session.find_window_for(package) {
            Some(window) => Ok(self.session.activate(window)?),
            None => self.spawn(package),
        }
    }

    fn launchable_apps(&self) -> Result<Vec<LaunchableApp>, PlatformError> {
        let apps: BTreeMap<String, String> = self
            .session
            .client_windows()
            .into_iter()
            .filter_map(|w| self.session.window_class(w))
            .collect();

        Ok(apps
            .into_iter()
            .map(|(package, label)| LaunchableApp { package, label })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reap_exited_children() {
        let done = Command::new("true").spawn().unwrap();
        let running = Command::new("sleep").arg("5").spawn().unwrap();
        let running_pid = running.id();
        let mut children = vec![("true".to_string(), done), ("sleep".to_string(), running)];

        // Let `true` finish
        std::thread::sleep(std::time::Duration::from_millis(200));
        reap_exited(&mut children);

        assert_eq!(children.len(), 1);
        let (package, child) = children.first_mut().unwrap();
        assert_eq!(package, "sleep");
        assert_eq!(child.id(), running_pid);
        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    #[ignore] // Requires X11 display
    fn test_active_app() {
        let session = X11Session::connect();
        assert!(session.is_connected());
        let _ = session.active_app();
    }

    #[test]
    #[ignore] // Requires X11 display
    fn test_usage_stats_record_active_window() {
        let stats = X11UsageStats::new();
        let now = now_millis();
        let records = stats
            .query_usage_stats(UsageGranularity::Daily, now - 1000, now + 1000)
            .unwrap();
        assert!(records.len() <= 1);
    }

    #[test]
    #[ignore] // Requires X11 display
    fn test_launchable_apps_are_unique() {
        let launcher = X11Launcher::new();
        let apps = launcher.launchable_apps().unwrap();
        let mut packages: Vec<_> = apps.iter().map(|a| a.package.clone()).collect();
        packages.dedup();
        assert_eq!(packages.len(), apps.len());
    }
}
