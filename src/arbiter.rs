//! Dual-role arbitration.
//!
//! Both roles come up at boot.  Whichever one links first keeps the radio
//! and the other is shut down; if neither links within the decision
//! budget the server role wins by default.  The arbitrator only reads
//! flags and calls the loser's shutdown hook, so it is safe to poll from
//! the main loop on every tick.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::config::{ArbitrationConfig, Millis};
use crate::link::SharedLink;

/// Roles brought up at initialisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RolesEnabled {
    ServerOnly,
    ClientOnly,
    Both,
    None,
}

impl RolesEnabled {
    pub fn server_enabled(self) -> bool {
        matches!(self, RolesEnabled::ServerOnly | RolesEnabled::Both)
    }

    pub fn client_enabled(self) -> bool {
        matches!(self, RolesEnabled::ClientOnly | RolesEnabled::Both)
    }

    /// Roles left to arbitrate when the server could not come up.
    pub fn without_server(self) -> Self {
        match self {
            RolesEnabled::Both => RolesEnabled::ClientOnly,
            RolesEnabled::ServerOnly => RolesEnabled::None,
            other => other,
        }
    }
}

/// Which roles are currently live.  `Both` only exists before a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RoleState {
    None,
    Server,
    Client,
    Both,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Server,
    Client,
}

/// Arbitration outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    /// Both roles running, decision clock ticking.
    Undecided,
    /// One role kept; terminal.
    Settled(Role),
    /// No role enabled; terminal.
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArbitrationTimers {
    pub decision_start: Millis,
    pub last_check: Millis,
}

/// The advertising (server) side as the arbitrator sees it.
pub trait PeripheralRole {
    fn connected_to_peer(&self) -> bool;
    /// Stop advertising and give up the role.
    fn stop_advertising(&self);
}

/// The scanning (client) side as the arbitrator sees it.
pub trait CentralRole {
    fn is_connected(&self) -> bool;
    /// Withdraw the role.  Local state only; see [`SharedLink::shutdown`].
    fn shutdown(&self);
}

impl<M: RawMutex> CentralRole for SharedLink<M> {
    fn is_connected(&self) -> bool {
        SharedLink::is_connected(self)
    }

    fn shutdown(&self) {
        SharedLink::shutdown(self)
    }
}

pub struct ModeArbitrator {
    decision: Decision,
    timers: ArbitrationTimers,
    config: ArbitrationConfig,
}

impl ModeArbitrator {
    /// Start arbitrating at `now` (after both roles are up).
    pub fn new(roles: RolesEnabled, now: Millis) -> Self {
        Self::with_config(roles, now, ArbitrationConfig::default())
    }

    pub fn with_config(roles: RolesEnabled, now: Millis, config: ArbitrationConfig) -> Self {
        let decision = match roles {
            RolesEnabled::Both => Decision::Undecided,
            RolesEnabled::ServerOnly => Decision::Settled(Role::Server),
            RolesEnabled::ClientOnly => Decision::Settled(Role::Client),
            RolesEnabled::None => Decision::Disabled,
        };
        Self {
            decision,
            timers: ArbitrationTimers {
                decision_start: now,
                last_check: now,
            },
            config,
        }
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn role_state(&self) -> RoleState {
        match self.decision {
            Decision::Undecided => RoleState::Both,
            Decision::Settled(Role::Server) => RoleState::Server,
            Decision::Settled(Role::Client) => RoleState::Client,
            Decision::Disabled => RoleState::None,
        }
    }

    pub fn timers(&self) -> ArbitrationTimers {
        self.timers
    }

    /// One arbitration step.  The decision timeout is checked on every
    /// call; connection checks only once a poll interval has passed since
    /// the last effective check.
    pub fn poll<S: PeripheralRole, C: CentralRole>(
        &mut self,
        now: Millis,
        server: &S,
        client: &C,
    ) -> Decision {
        if self.decision != Decision::Undecided {
            return self.decision;
        }

        if now.saturating_sub(self.timers.decision_start) > self.config.decision_timeout_ms {
            #[cfg(feature = "defmt")]
            defmt::info!(
                "no connection within {} ms, keeping server role",
                self.config.decision_timeout_ms
            );
            client.shutdown();
            self.decision = Decision::Settled(Role::Server);
            return self.decision;
        }

        if now.saturating_sub(self.timers.last_check) < self.config.poll_interval_ms {
            return self.decision;
        }
        self.timers.last_check = now;

        if client.is_connected() {
            #[cfg(feature = "defmt")]
            defmt::info!("client role connected, stopping advertising");
            server.stop_advertising();
            self.decision = Decision::Settled(Role::Client);
        } else if server.connected_to_peer() {
            #[cfg(feature = "defmt")]
            defmt::info!("server role connected, shutting down client");
            client.shutdown();
            self.decision = Decision::Settled(Role::Server);
        }

        self.decision
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    const T0: Millis = 200;

    #[derive(Default)]
    struct Server {
        connected: Cell<bool>,
        stopped: Cell<u32>,
    }

    impl PeripheralRole for Server {
        fn connected_to_peer(&self) -> bool {
            self.connected.get()
        }
        fn stop_advertising(&self) {
            self.stopped.set(self.stopped.get() + 1);
        }
    }

    #[derive(Default)]
    struct Client {
        connected: Cell<bool>,
        shutdowns: Cell<u32>,
    }

    impl CentralRole for Client {
        fn is_connected(&self) -> bool {
            self.connected.get()
        }
        fn shutdown(&self) {
            self.connected.set(false);
            self.shutdowns.set(self.shutdowns.get() + 1);
        }
    }

    #[test]
    fn server_connect_settles_server() {
        let (s, c) = (Server::default(), Client::default());
        let mut arb = ModeArbitrator::new(RolesEnabled::Both, T0);
        assert_eq!(arb.role_state(), RoleState::Both);

        s.connected.set(true); // at T0 + 5000
        assert_eq!(arb.poll(T0 + 6_000, &s, &c), Decision::Settled(Role::Server));
        assert_eq!(c.shutdowns.get(), 1);
        assert_eq!(s.stopped.get(), 0);
        assert_eq!(arb.role_state(), RoleState::Server);
    }

    #[test]
    fn timeout_defaults_to_server() {
        let (s, c) = (Server::default(), Client::default());
        let mut arb = ModeArbitrator::new(RolesEnabled::Both, T0);

        for k in 1..=30 {
            assert_eq!(arb.poll(T0 + k * 1_000, &s, &c), Decision::Undecided);
        }
        // One millisecond past the budget, inside the poll interval.
        assert_eq!(arb.poll(T0 + 30_001, &s, &c), Decision::Settled(Role::Server));
        assert_eq!(c.shutdowns.get(), 1);
        assert_eq!(s.stopped.get(), 0);
    }

    #[test]
    fn single_poll_after_timeout() {
        let (s, c) = (Server::default(), Client::default());
        let mut arb = ModeArbitrator::new(RolesEnabled::Both, T0);
        assert_eq!(arb.poll(T0 + 30_001, &s, &c), Decision::Settled(Role::Server));
    }

    #[test]
    fn timeout_wins_over_late_connection() {
        let (s, c) = (Server::default(), Client::default());
        let mut arb = ModeArbitrator::new(RolesEnabled::Both, T0);
        c.connected.set(true);
        assert_eq!(arb.poll(T0 + 40_000, &s, &c), Decision::Settled(Role::Server));
        assert!(!c.connected.get());
    }

    #[test]
    fn same_tick_tie_goes_to_client() {
        let (s, c) = (Server::default(), Client::default());
        let mut arb = ModeArbitrator::new(RolesEnabled::Both, T0);
        s.connected.set(true);
        c.connected.set(true);

        assert_eq!(arb.poll(T0 + 2_000, &s, &c), Decision::Settled(Role::Client));
        assert_eq!(s.stopped.get(), 1);
        assert_eq!(c.shutdowns.get(), 0);
    }

    #[test]
    fn polls_inside_interval_are_no_ops() {
        let (s, c) = (Server::default(), Client::default());
        let mut arb = ModeArbitrator::new(RolesEnabled::Both, T0);
        s.connected.set(true);

        assert_eq!(arb.poll(T0 + 500, &s, &c), Decision::Undecided);
        assert_eq!(arb.timers().last_check, T0);
        assert_eq!(c.shutdowns.get(), 0);
        assert_eq!(arb.poll(T0 + 1_000, &s, &c), Decision::Settled(Role::Server));
    }

    #[test]
    fn nothing_connected_stays_undecided() {
        let (s, c) = (Server::default(), Client::default());
        let mut arb = ModeArbitrator::new(RolesEnabled::Both, T0);
        for k in 1..=30 {
            assert_eq!(arb.poll(T0 + k * 1_000, &s, &c), Decision::Undecided);
        }
        assert_eq!(arb.timers().last_check, T0 + 30_000);
    }

    #[test]
    fn settled_is_sticky() {
        let (s, c) = (Server::default(), Client::default());
        let mut arb = ModeArbitrator::new(RolesEnabled::Both, T0);
        c.connected.set(true);
        assert_eq!(arb.poll(T0 + 1_000, &s, &c), Decision::Settled(Role::Client));

        c.connected.set(false);
        s.connected.set(true);
        assert_eq!(arb.poll(T0 + 60_000, &s, &c), Decision::Settled(Role::Client));
        assert_eq!(s.stopped.get(), 1);
        assert_eq!(c.shutdowns.get(), 0);
    }

    #[test]
    fn single_role_is_fixed_at_boot() {
        let (s, c) = (Server::default(), Client::default());
        let mut server_only = ModeArbitrator::new(RolesEnabled::ServerOnly, T0);
        let mut client_only = ModeArbitrator::new(RolesEnabled::ClientOnly, T0);
        let mut none = ModeArbitrator::new(RolesEnabled::None, T0);

        assert_eq!(server_only.poll(T0 + 50_000, &s, &c), Decision::Settled(Role::Server));
        assert_eq!(client_only.poll(T0 + 50_000, &s, &c), Decision::Settled(Role::Client));
        assert_eq!(none.poll(T0 + 50_000, &s, &c), Decision::Disabled);
        assert_eq!(none.role_state(), RoleState::None);
        assert_eq!(c.shutdowns.get(), 0);
        assert_eq!(s.stopped.get(), 0);
    }

    #[test]
    fn roles_enabled_flags() {
        assert!(RolesEnabled::Both.server_enabled() && RolesEnabled::Both.client_enabled());
        assert!(RolesEnabled::ServerOnly.server_enabled());
        assert!(!RolesEnabled::ServerOnly.client_enabled());
        assert!(!RolesEnabled::None.server_enabled());
    }

    #[test]
    fn missing_server_leaves_client_in_charge() {
        let roles = RolesEnabled::Both.without_server();
        assert_eq!(roles, RolesEnabled::ClientOnly);
        assert_eq!(RolesEnabled::ServerOnly.without_server(), RolesEnabled::None);
        assert_eq!(RolesEnabled::ClientOnly.without_server(), RolesEnabled::ClientOnly);

        // The timeout must not hand the radio to a server that never came up.
        let (s, c) = (Server::default(), Client::default());
        let mut arb = ModeArbitrator::new(roles, T0);
        assert_eq!(arb.poll(T0 + 40_000, &s, &c), Decision::Settled(Role::Client));
        assert_eq!(c.shutdowns.get(), 0);
    }

    #[test]
    fn custom_timing() {
        let (s, c) = (Server::default(), Client::default());
        let cfg = ArbitrationConfig {
            poll_interval_ms: 100,
            decision_timeout_ms: 1_000,
        };
        let mut arb = ModeArbitrator::with_config(RolesEnabled::Both, 0, cfg);
        assert_eq!(arb.poll(100, &s, &c), Decision::Undecided);
        assert_eq!(arb.poll(1_100, &s, &c), Decision::Settled(Role::Server));
    }

    #[test]
    fn shared_link_as_central_role() {
        use embassy_sync::blocking_mutex::raw::NoopRawMutex;
        let s = Server::default();
        let link = SharedLink::<NoopRawMutex>::new();
        link.request_scan("BBC");
        let mut arb = ModeArbitrator::new(RolesEnabled::Both, T0);

        s.connected.set(true);
        arb.poll(T0 + 1_000, &s, &link);
        assert!(!link.scan_requested());
    }
}
