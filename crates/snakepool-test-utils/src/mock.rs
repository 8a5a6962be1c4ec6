//! In-memory environment server implementing [`Transport`].
//!
//! [`MockServer`] runs small seed-deterministic snake games, honours the
//! pooled echo contract, and routes every outcome through the real codec so
//! payload faults surface exactly as they would from a remote server.
//! Faults queued with [`MockServer::inject`] apply to the next call; those
//! queued with [`MockServer::inject_for`] wait for the named operation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use snakepool_client::transport::{PoolReply, Transport};
use snakepool_core::codec::{self, ObsPayload, OutcomePayload, RawPayload};
use snakepool_core::error::{ClientError, TransportError};
use snakepool_core::types::{Action, Direction, EnvSpec, ObsKind, Point, SIGNAL_NAMES, StepOutcome};

// ---------------------------------------------------------------------------
// Configuration and faults
// ---------------------------------------------------------------------------

/// Board and spec settings of a [`MockServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockConfig {
    pub cols: i32,
    pub rows: i32,
    pub timeout_mult: u32,
    pub supported_obs: Vec<ObsKind>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            cols: 12,
            rows: 12,
            timeout_mult: 20,
            supported_obs: ObsKind::ALL.to_vec(),
        }
    }
}

/// A misbehaviour applied to one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Fail with [`TransportError::Timeout`].
    Timeout,
    /// Fail with [`TransportError::Connect`].
    Unavailable,
    /// Resize every dense observation in the reply.
    DenseLength(usize),
    /// Drop the observation from every outcome in the reply.
    MissingObs,
    /// Return one env fewer than the pool has.
    DropEnv,
    /// Return an empty session id from `reset_many`.
    EmptySession,
    /// Return a different session id than the one asked for.
    ForeignSession,
    /// Echo terminated slots with a non-zero step cost.
    NoisyEcho,
}

// ---------------------------------------------------------------------------
// MockEnv
// ---------------------------------------------------------------------------

const STEP_COST: f32 = -0.01;
const TOWARD_FOOD: f32 = 0.01;
const TURNING: f32 = -0.001;

#[derive(Debug, Clone)]
struct MockEnv {
    cols: i32,
    rows: i32,
    timeout_mult: u32,
    rng: ChaCha8Rng,
    head: Point,
    dir: Direction,
    body: Vec<Point>,
    food: Point,
    score: u32,
    steps: u32,
    since_food: u32,
    terminal: Option<OutcomePayload>,
}

impl MockEnv {
    fn new(config: &MockConfig, seed: u64) -> Self {
        let head = Point::new(config.cols / 2, config.rows / 2);
        let mut env = Self {
            cols: config.cols,
            rows: config.rows,
            timeout_mult: config.timeout_mult,
            rng: ChaCha8Rng::seed_from_u64(seed),
            head,
            dir: Direction::Right,
            body: vec![Point::new(head.x - 1, head.y), Point::new(head.x - 2, head.y)],
            food: head,
            score: 0,
            steps: 0,
            since_food: 0,
            terminal: None,
        };
        env.food = env.place_food();
        env
    }

    fn length(&self) -> u32 {
        u32::try_from(self.body.len() + 1).unwrap_or(u32::MAX)
    }

    fn in_bounds(&self, p: Point) -> bool {
        (0..self.cols).contains(&p.x) && (0..self.rows).contains(&p.y)
    }

    fn blocked(&self, p: Point) -> bool {
        !self.in_bounds(p) || self.body.contains(&p)
    }

    fn place_food(&mut self) -> Point {
        let cells = usize::try_from(self.cols * self.rows).unwrap_or(0);
        if self.body.len() + 1 >= cells {
            return self.head;
        }
        loop {
            let p = Point::new(
                self.rng.gen_range(0..self.cols),
                self.rng.gen_range(0..self.rows),
            );
            if p != self.head && !self.body.contains(&p) {
                return p;
            }
        }
    }

    fn initial(&self, kind: ObsKind) -> OutcomePayload {
        self.payload(kind, [0.0; 6], false, "")
    }

    fn step(&mut self, kind: ObsKind, action: Action) -> OutcomePayload {
        let mut signals = [0.0_f32; 6];
        signals[2] = STEP_COST;
        if action != Action::Straight {
            signals[4] = TURNING;
        }

        let dir = turn(self.dir, action);
        let next = advance(self.head, dir);
        self.dir = dir;
        self.steps += 1;
        self.since_food += 1;

        let tail_moves = next != self.food;
        let body_hit = self
            .body
            .iter()
            .take(if tail_moves { self.body.len() - 1 } else { self.body.len() })
            .any(|p| *p == next);
        let death = if !self.in_bounds(next) {
            "wall"
        } else if body_hit {
            "self"
        } else {
            ""
        };
        if !death.is_empty() {
            signals[1] = -1.0;
            return self.terminate(kind, signals, death);
        }

        let before = manhattan(self.head, self.food);
        let after = manhattan(next, self.food);
        signals[3] = if after < before { TOWARD_FOOD } else { -TOWARD_FOOD };

        self.body.insert(0, self.head);
        self.head = next;
        if self.head == self.food {
            self.score += 1;
            self.since_food = 0;
            signals[0] = 1.0;
            self.food = self.place_food();
        } else {
            self.body.pop();
        }

        if self.since_food > self.timeout_mult * self.length() {
            signals[5] = 1.0;
            return self.terminate(kind, signals, "timeout");
        }
        self.payload(kind, signals, false, "")
    }

    fn terminate(&mut self, kind: ObsKind, signals: [f32; 6], death: &str) -> OutcomePayload {
        let payload = self.payload(kind, signals, true, death);
        self.terminal = Some(payload.clone());
        payload
    }

    fn echo(&self, noisy: bool) -> Option<OutcomePayload> {
        let mut echo = self.terminal.clone()?;
        echo.signals = vec![0.0; SIGNAL_NAMES.len()];
        if noisy {
            echo.signals[2] = STEP_COST;
        }
        Some(echo)
    }

    fn payload(&self, kind: ObsKind, signals: [f32; 6], done: bool, death: &str) -> OutcomePayload {
        OutcomePayload {
            obs: Some(self.observation(kind)),
            signals: signals.to_vec(),
            done,
            score: self.score.into(),
            length: self.length().into(),
            death: death.to_string(),
            steps: self.steps.into(),
            render: None,
        }
    }

    fn observation(&self, kind: ObsKind) -> ObsPayload {
        match kind.dense_len() {
            Some(len) => ObsPayload {
                declared: None,
                dense: Some(self.dense(len)),
                raw: None,
            },
            None => ObsPayload {
                declared: None,
                dense: None,
                raw: Some(self.raw()),
            },
        }
    }

    fn raw(&self) -> RawPayload {
        RawPayload {
            cols: self.cols.into(),
            rows: self.rows.into(),
            step: self.steps.into(),
            head: Some(self.head),
            dir: self.dir.wire_name().to_string(),
            food: Some(self.food),
            body: self.body.clone(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn dense(&self, len: usize) -> Vec<f32> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let danger = |action| flag(self.blocked(advance(self.head, turn(self.dir, action))));
        let base = [
            danger(Action::Straight),
            danger(Action::TurnRight),
            danger(Action::TurnLeft),
            flag(self.dir == Direction::Right),
            flag(self.dir == Direction::Down),
            flag(self.dir == Direction::Left),
            flag(self.dir == Direction::Up),
            flag(self.food.x < self.head.x),
            flag(self.food.x > self.head.x),
            flag(self.food.y < self.head.y),
            flag(self.food.y > self.head.y),
        ];
        let extra = [
            self.head.x as f32 / self.cols as f32,
            self.head.y as f32 / self.rows as f32,
            self.food.x as f32 / self.cols as f32,
            self.food.y as f32 / self.rows as f32,
            self.length() as f32 / (self.cols * self.rows) as f32,
        ];
        (0..len)
            .map(|i| {
                if i < base.len() {
                    base[i]
                } else {
                    extra[(i - base.len()) % extra.len()]
                }
            })
            .collect()
    }
}

const fn turn(dir: Direction, action: Action) -> Direction {
    match (action, dir) {
        (Action::Straight, d) => d,
        (Action::TurnRight, Direction::Right) | (Action::TurnLeft, Direction::Left) => Direction::Down,
        (Action::TurnRight, Direction::Down) | (Action::TurnLeft, Direction::Up) => Direction::Left,
        (Action::TurnRight, Direction::Left) | (Action::TurnLeft, Direction::Right) => Direction::Up,
        (Action::TurnRight, Direction::Up) | (Action::TurnLeft, Direction::Down) => Direction::Right,
    }
}

const fn advance(p: Point, dir: Direction) -> Point {
    match dir {
        Direction::Right => Point::new(p.x + 1, p.y),
        Direction::Down => Point::new(p.x, p.y + 1),
        Direction::Left => Point::new(p.x - 1, p.y),
        Direction::Up => Point::new(p.x, p.y - 1),
    }
}

const fn manhattan(a: Point, b: Point) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

// ---------------------------------------------------------------------------
// MockServer
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Pool {
    kind: ObsKind,
    envs: Vec<MockEnv>,
}

#[derive(Debug, Default)]
struct State {
    single: Option<(MockEnv, ObsKind)>,
    pools: HashMap<String, Pool>,
    next_session: u64,
    calls: HashMap<&'static str, usize>,
    faults: VecDeque<(Option<&'static str>, Fault)>,
}

/// Deterministic in-process stand-in for a remote env server.
///
/// # Example
///
/// ```
/// use snakepool_client::transport::Transport;
/// use snakepool_core::types::ObsKind;
/// use snakepool_test_utils::mock::MockServer;
///
/// let server = MockServer::new();
/// let a = server.reset(7, ObsKind::Dense11).unwrap();
/// let b = server.reset(7, ObsKind::Dense11).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(server.calls("reset"), 2);
/// ```
#[derive(Debug)]
pub struct MockServer {
    config: MockConfig,
    state: Mutex<State>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    pub const fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Queue a fault for the next call.
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back((None, fault));
    }

    /// Queue a fault for the next `operation` call, leaving other calls
    /// (such as the facade's spec fetch) untouched.
    pub fn inject_for(&self, operation: &'static str, fault: Fault) {
        self.lock().faults.push_back((Some(operation), fault));
    }

    /// Number of calls received for `operation` (`"reset"`, `"step_many"`, ...).
    pub fn calls(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Number of pooled sessions the server knows.
    pub fn session_count(&self) -> usize {
        self.lock().pools.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(
        &self,
        operation: &'static str,
    ) -> Result<(MutexGuard<'_, State>, Option<Fault>), ClientError> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_default() += 1;
        let fault = state
            .faults
            .iter()
            .position(|(target, _)| target.is_none_or(|t| t == operation))
            .and_then(|i| state.faults.remove(i))
            .map(|(_, fault)| fault);
        match fault {
            Some(Fault::Timeout) => Err(TransportError::Timeout { operation }.into()),
            Some(Fault::Unavailable) => Err(TransportError::Connect {
                operation,
                message: "mock server unavailable".into(),
            }
            .into()),
            fault => Ok((state, fault)),
        }
    }
}

fn rpc_error(operation: &'static str, code: &str, message: impl Into<String>) -> ClientError {
    TransportError::Rpc {
        operation,
        code: code.into(),
        message: message.into(),
    }
    .into()
}

fn tamper(payload: &mut OutcomePayload, fault: Option<&Fault>) {
    match fault {
        Some(Fault::DenseLength(len)) => {
            if let Some(dense) = payload.obs.as_mut().and_then(|o| o.dense.as_mut()) {
                dense.resize(*len, 0.0);
            }
        }
        Some(Fault::MissingObs) => payload.obs = None,
        _ => {}
    }
}

fn decode_all(kind: ObsKind, payloads: Vec<OutcomePayload>) -> Result<Vec<StepOutcome>, ClientError> {
    payloads
        .into_iter()
        .map(|p| codec::decode_outcome(kind, p).map_err(ClientError::from))
        .collect()
}

impl Transport for MockServer {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn get_spec(&self) -> Result<EnvSpec, ClientError> {
        drop(self.begin("get_spec")?);
        Ok(EnvSpec {
            cols: u32::try_from(self.config.cols).unwrap_or(0),
            rows: u32::try_from(self.config.rows).unwrap_or(0),
            timeout_mult: self.config.timeout_mult,
            supported_obs: self.config.supported_obs.clone(),
            reward_signals: SIGNAL_NAMES.iter().map(ToString::to_string).collect(),
        })
    }

    fn reset(&self, seed: u64, kind: ObsKind) -> Result<StepOutcome, ClientError> {
        let (mut state, fault) = self.begin("reset")?;
        let env = MockEnv::new(&self.config, seed);
        let mut payload = env.initial(kind);
        tamper(&mut payload, fault.as_ref());
        state.single = Some((env, kind));
        Ok(codec::decode_outcome(kind, payload)?)
    }

    fn step(&self, kind: ObsKind, action: Action) -> Result<StepOutcome, ClientError> {
        let (mut state, fault) = self.begin("step")?;
        let Some((env, server_kind)) = state.single.as_mut() else {
            return Err(rpc_error("step", "FailedPrecondition", "reset first"));
        };
        let mut payload = match env.echo(false) {
            Some(echo) => echo,
            None => env.step(*server_kind, action),
        };
        tamper(&mut payload, fault.as_ref());
        Ok(codec::decode_outcome(kind, payload)?)
    }

    fn reset_many(
        &self,
        seeds: &[u64],
        kind: ObsKind,
        session: Option<&str>,
    ) -> Result<PoolReply, ClientError> {
        let (mut state, fault) = self.begin("reset_many")?;
        if seeds.is_empty() {
            return Err(rpc_error("reset_many", "InvalidArgument", "count must be > 0"));
        }
        let id = match session {
            Some(id) if !state.pools.contains_key(id) => {
                return Err(rpc_error(
                    "reset_many",
                    "NotFound",
                    format!("Session '{id}' not found."),
                ));
            }
            Some(id) => id.to_string(),
            None => {
                state.next_session += 1;
                format!("mock-{:04}", state.next_session)
            }
        };

        let envs: Vec<MockEnv> = seeds
            .iter()
            .map(|&seed| MockEnv::new(&self.config, seed))
            .collect();
        let mut payloads: Vec<OutcomePayload> = envs.iter().map(|e| e.initial(kind)).collect();
        state.pools.insert(id.clone(), Pool { kind, envs });

        for payload in &mut payloads {
            tamper(payload, fault.as_ref());
        }
        let session = match fault {
            Some(Fault::DropEnv) => {
                payloads.pop();
                id
            }
            Some(Fault::EmptySession) => String::new(),
            Some(Fault::ForeignSession) => "mock-ffff".into(),
            _ => id,
        };
        Ok(PoolReply {
            session,
            envs: decode_all(kind, payloads)?,
        })
    }

    fn step_many(
        &self,
        session: &str,
        kind: ObsKind,
        actions: &[Action],
    ) -> Result<PoolReply, ClientError> {
        let (mut state, fault) = self.begin("step_many")?;
        let Some(pool) = state.pools.get_mut(session) else {
            return Err(rpc_error(
                "step_many",
                "NotFound",
                format!("Session '{session}' not found."),
            ));
        };
        let n = pool.envs.len();
        if actions.len() != 1 && actions.len() != n {
            return Err(rpc_error(
                "step_many",
                "InvalidArgument",
                format!("actions length must be 1 (broadcast) or {n}."),
            ));
        }

        let noisy = fault == Some(Fault::NoisyEcho);
        let pool_kind = pool.kind;
        let mut payloads: Vec<OutcomePayload> = pool
            .envs
            .iter_mut()
            .enumerate()
            .map(|(i, env)| match env.echo(noisy) {
                Some(echo) => echo,
                None => env.step(pool_kind, actions[if actions.len() == 1 { 0 } else { i }]),
            })
            .collect();

        for payload in &mut payloads {
            tamper(payload, fault.as_ref());
        }
        if fault == Some(Fault::DropEnv) {
            payloads.pop();
        }
        Ok(PoolReply {
            session: session.to_string(),
            envs: decode_all(kind, payloads)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use snakepool_core::error::ObsError;

    use super::*;

    #[test]
    fn turning_is_relative_to_heading() {
        assert_eq!(turn(Direction::Right, Action::TurnRight), Direction::Down);
        assert_eq!(turn(Direction::Right, Action::TurnLeft), Direction::Up);
        assert_eq!(turn(Direction::Up, Action::TurnRight), Direction::Right);
        assert_eq!(turn(Direction::Left, Action::Straight), Direction::Left);
        for dir in [Direction::Right, Direction::Down, Direction::Left, Direction::Up] {
            let back = turn(turn(dir, Action::TurnRight), Action::TurnLeft);
            assert_eq!(back, dir);
        }
    }

    #[test]
    fn going_straight_hits_the_wall() {
        let mut env = MockEnv::new(&MockConfig::default(), 5);
        let mut last = None;
        for _ in 0..20 {
            let payload = env.step(ObsKind::Dense11, Action::Straight);
            let done = payload.done;
            last = Some(payload);
            if done {
                break;
            }
        }
        let last = last.unwrap();
        assert!(last.done);
        assert_eq!(last.death, "wall");
        assert!((last.signals[1] + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn every_kind_has_the_right_shape() {
        let env = MockEnv::new(&MockConfig::default(), 1);
        for kind in ObsKind::ALL {
            let outcome = codec::decode_outcome(kind, env.initial(kind)).unwrap();
            assert!(outcome.obs.matches_kind(kind), "{kind}");
            assert_eq!(outcome.length, 3);
        }
    }

    #[test]
    fn same_seed_same_food() {
        let a = MockEnv::new(&MockConfig::default(), 99);
        let b = MockEnv::new(&MockConfig::default(), 99);
        assert_eq!(a.food, b.food);
    }

    #[test]
    fn echo_repeats_terminal_with_zero_signals() {
        let mut env = MockEnv::new(&MockConfig::default(), 5);
        assert!(env.echo(false).is_none());
        while !env.step(ObsKind::Dense11, Action::Straight).done {}
        let echo = env.echo(false).unwrap();
        let terminal = env.terminal.clone().unwrap();
        assert!(echo.done);
        assert!(echo.signals.iter().all(|s| *s == 0.0));
        assert_eq!(echo.score, terminal.score);
        assert_eq!(echo.death, terminal.death);
        assert!((env.echo(true).unwrap().signals[2] - STEP_COST).abs() < f32::EPSILON);
    }

    #[test]
    fn faults_apply_to_one_call() {
        let server = MockServer::new();
        server.inject(Fault::Timeout);
        let err = server.reset(1, ObsKind::Dense11).unwrap_err();
        assert!(err.is_timeout());
        assert!(server.reset(1, ObsKind::Dense11).is_ok());
        assert_eq!(server.calls("reset"), 2);
    }

    #[test]
    fn targeted_fault_waits_for_its_operation() {
        let server = MockServer::new();
        server.inject_for("reset", Fault::DenseLength(4));
        assert!(server.get_spec().is_ok());
        let err = server.reset(1, ObsKind::Dense11).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Observation(ObsError::ObsLengthMismatch { actual: 4, .. })
        ));
        assert!(server.reset(1, ObsKind::Dense11).is_ok());
    }

    #[test]
    fn step_before_reset_is_rejected() {
        let server = MockServer::new();
        let err = server.step(ObsKind::Dense11, Action::Straight).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport(TransportError::Rpc { ref code, .. }) if code == "FailedPrecondition"
        ));
    }
}
