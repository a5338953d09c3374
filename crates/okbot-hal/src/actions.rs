//! Named gesture and drive scripts, and the keyword table that resolves
//! spoken phrases to them.
//!
//! Scripts are pure data ([`ActionSpec`]); nothing here touches hardware or
//! branches on sensor input. The arbiter replays a script step by step.
//!
//! # Keyword resolution
//!
//! [`ActionLibrary::lookup_exact`] matches a whole normalized phrase.
//! [`ActionLibrary::longest_substring`] scans every keyword and keeps the
//! longest one contained in the text, so `"please turn left now"` resolves via
//! `"turn left"` rather than `"left"`.

use std::time::Duration;

use okbot_types::{ActionSpec, RobotConfig, Sweep};

/// Every scripted behaviour the robot knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
    LookLeft,
    LookRight,
    LookUp,
    LookDown,
    LookCenter,
    ShakeHead,
    Nod,
    WaveHands,
    Resist,
    ActCute,
    RubHands,
    Think,
    TwistBody,
    Celebrate,
    Depressed,
    SpinAround,
    Dance,
    Patrol,
    Reset,
}

impl Action {
    pub const ALL: [Action; 24] = [
        Action::Forward,
        Action::Backward,
        Action::TurnLeft,
        Action::TurnRight,
        Action::Stop,
        Action::LookLeft,
        Action::LookRight,
        Action::LookUp,
        Action::LookDown,
        Action::LookCenter,
        Action::ShakeHead,
        Action::Nod,
        Action::WaveHands,
        Action::Resist,
        Action::ActCute,
        Action::RubHands,
        Action::Think,
        Action::TwistBody,
        Action::Celebrate,
        Action::Depressed,
        Action::SpinAround,
        Action::Dance,
        Action::Patrol,
        Action::Reset,
    ];

    /// Canonical snake_case name, as advertised to the chat model.
    pub fn name(self) -> &'static str {
        match self {
            Action::Forward => "forward",
            Action::Backward => "backward",
            Action::TurnLeft => "turn_left",
            Action::TurnRight => "turn_right",
            Action::Stop => "stop",
            Action::LookLeft => "look_left",
            Action::LookRight => "look_right",
            Action::LookUp => "look_up",
            Action::LookDown => "look_down",
            Action::LookCenter => "look_center",
            Action::ShakeHead => "shake_head",
            Action::Nod => "nod",
            Action::WaveHands => "wave_hands",
            Action::Resist => "resist",
            Action::ActCute => "act_cute",
            Action::RubHands => "rub_hands",
            Action::Think => "think",
            Action::TwistBody => "twist_body",
            Action::Celebrate => "celebrate",
            Action::Depressed => "depressed",
            Action::SpinAround => "spin_around",
            Action::Dance => "dance",
            Action::Patrol => "patrol",
            Action::Reset => "reset",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Speed, duration, and turn angle used by the drive primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionProfile {
    pub speed: u8,
    pub duration: Duration,
    pub turn_angle: i32,
}

impl MotionProfile {
    pub fn from_config(config: &RobotConfig) -> Self {
        Self {
            speed: config.move_speed,
            duration: config.move_duration(),
            turn_angle: config.turn_angle,
        }
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::from_config(&RobotConfig::default())
    }
}

/// Keyword aliases in table order. Equal-length substring matches resolve
/// to whichever keyword appears first here.
const KEYWORDS: &[(&str, Action)] = &[
    ("forward", Action::Forward),
    ("go forward", Action::Forward),
    ("move forward", Action::Forward),
    ("go ahead", Action::Forward),
    ("backward", Action::Backward),
    ("go backward", Action::Backward),
    ("move backward", Action::Backward),
    ("go back", Action::Backward),
    ("reverse", Action::Backward),
    ("back up", Action::Backward),
    ("turn left", Action::TurnLeft),
    ("go left", Action::TurnLeft),
    ("left", Action::TurnLeft),
    ("turn right", Action::TurnRight),
    ("go right", Action::TurnRight),
    ("right", Action::TurnRight),
    ("stop", Action::Stop),
    ("halt", Action::Stop),
    ("freeze", Action::Stop),
    ("look left", Action::LookLeft),
    ("look right", Action::LookRight),
    ("look up", Action::LookUp),
    ("look down", Action::LookDown),
    ("look center", Action::LookCenter),
    ("center", Action::LookCenter),
    ("shake head", Action::ShakeHead),
    ("say no", Action::ShakeHead),
    ("nod", Action::Nod),
    ("say yes", Action::Nod),
    ("wave", Action::WaveHands),
    ("wave hands", Action::WaveHands),
    ("resist", Action::Resist),
    ("refuse", Action::Resist),
    ("act cute", Action::ActCute),
    ("cute", Action::ActCute),
    ("rub hands", Action::RubHands),
    ("think", Action::Think),
    ("thinking", Action::Think),
    ("twist", Action::TwistBody),
    ("twist body", Action::TwistBody),
    ("celebrate", Action::Celebrate),
    ("party", Action::Celebrate),
    ("happy", Action::Celebrate),
    ("depressed", Action::Depressed),
    ("sad", Action::Depressed),
    ("spin", Action::SpinAround),
    ("spin around", Action::SpinAround),
    ("dance", Action::Dance),
    ("patrol", Action::Patrol),
    ("reset", Action::Reset),
];

/// Keyword table plus the script builder for every [`Action`].
#[derive(Debug, Clone, Default)]
pub struct ActionLibrary {
    motion: MotionProfile,
}

impl ActionLibrary {
    pub fn new(motion: MotionProfile) -> Self {
        Self { motion }
    }

    pub fn motion(&self) -> MotionProfile {
        self.motion
    }

    /// All keyword aliases in table order.
    pub fn keywords(&self) -> impl Iterator<Item = (&'static str, Action)> {
        KEYWORDS.iter().copied()
    }

    /// Exact keyword match on already-normalized text.
    ///
    /// Canonical action names (`turn_left`) are accepted as well as spoken
    /// aliases, so generated directive names resolve here too.
    pub fn lookup_exact(&self, text: &str) -> Option<Action> {
        KEYWORDS
            .iter()
            .find(|(kw, _)| *kw == text)
            .map(|(_, a)| *a)
            .or_else(|| Action::ALL.iter().copied().find(|a| a.name() == text))
    }

    /// Longest keyword contained in `text`, with the matched keyword.
    pub fn longest_substring(&self, text: &str) -> Option<(&'static str, Action)> {
        let mut best: Option<(&'static str, Action)> = None;
        for &(kw, action) in KEYWORDS {
            if text.contains(kw) && best.is_none_or(|(b, _)| kw.len() > b.len()) {
                best = Some((kw, action));
            }
        }
        best
    }

    /// The script for `action`, parameterized by this library's motion profile.
    pub fn script(&self, action: Action) -> ActionSpec {
        let MotionProfile {
            speed,
            duration,
            turn_angle,
        } = self.motion;
        let spec = ActionSpec::new(action.name());
        match action {
            Action::Forward => spec.steer(0).forward(speed).hold(duration).stop(),
            Action::Backward => spec.steer(0).backward(speed).hold(duration).stop(),
            Action::TurnLeft => spec
                .steer(-turn_angle)
                .forward(speed)
                .hold(duration)
                .stop()
                .steer(0),
            Action::TurnRight => spec
                .steer(turn_angle)
                .forward(speed)
                .hold(duration)
                .stop()
                .steer(0),
            Action::Stop => spec.stop().steer(0),
            Action::LookLeft => spec.pan(60).hold_ms(500),
            Action::LookRight => spec.pan(-60).hold_ms(500),
            Action::LookUp => spec.tilt(30).hold_ms(500),
            Action::LookDown => spec.tilt(-30).hold_ms(500),
            Action::LookCenter => spec.pan(0).tilt(0).hold_ms(300),
            Action::ShakeHead => [30, -30, 20, -20, 10, -10, 0]
                .into_iter()
                .fold(spec, |s, a| s.pan(a).hold_ms(120))
                .pan(0),
            Action::Nod => [20, -10, 15, -5, 0]
                .into_iter()
                .fold(spec, |s, a| s.tilt(a).hold_ms(200))
                .tilt(0),
            Action::WaveHands => wave_hands(spec),
            Action::Resist => (0..3)
                .fold(spec.tilt(10), |s, _| {
                    s.steer(15).pan(15).hold_ms(150).steer(-15).pan(-15).hold_ms(150)
                })
                .stop()
                .steer(0)
                .pan(0)
                .tilt(0),
            Action::ActCute => (0..3)
                .fold(spec.tilt(-15).hold_ms(200), |s, _| {
                    s.forward(15)
                        .hold_ms(100)
                        .stop()
                        .hold_ms(50)
                        .backward(15)
                        .hold_ms(100)
                        .stop()
                        .hold_ms(50)
                })
                .tilt(0),
            Action::RubHands => (0..5)
                .fold(spec, |s, _| s.steer(6).hold_ms(100).steer(-6).hold_ms(100))
                .steer(0),
            Action::Think => spec
                .pan(-30)
                .tilt(-10)
                .steer(15)
                .hold_ms(1000)
                .pan(-15)
                .hold_ms(500)
                .steer(0)
                .pan(0)
                .tilt(0),
            Action::TwistBody => (0..3)
                .fold(spec, |s, _| {
                    s.forward(15)
                        .hold_ms(150)
                        .stop()
                        .pan(20)
                        .steer(-15)
                        .hold_ms(150)
                        .backward(15)
                        .hold_ms(150)
                        .stop()
                        .pan(-20)
                        .steer(15)
                        .hold_ms(150)
                })
                .stop()
                .steer(0)
                .pan(0),
            Action::Celebrate => celebrate(spec),
            Action::Depressed => [-10, -20, -15, -25, -10]
                .into_iter()
                .fold(spec, |s, a| s.tilt(a).hold_ms(400))
                .hold_ms(1000)
                .tilt(0),
            Action::SpinAround => spec
                .steer(35)
                .forward(speed)
                .hold_ms(2500)
                .stop()
                .steer(0),
            Action::Dance => {
                let moves = (0..2)
                    .fold(spec, |s, _| {
                        s.steer(25).forward(20).hold_ms(300).steer(-25).hold_ms(300)
                    })
                    .stop()
                    .steer(0);
                celebrate(wave_hands(moves))
            }
            Action::Patrol => spec
                .forward(25)
                .sweep(Sweep {
                    step: 5,
                    bound: 45,
                    tick: Duration::from_millis(100),
                    duration: Duration::from_secs(5),
                })
                .stop()
                .pan(0),
            Action::Reset => spec.then(ActionSpec::neutral()),
        }
    }
}

fn wave_hands(spec: ActionSpec) -> ActionSpec {
    (0..2)
        .fold(spec.tilt(15), |s, _| {
            s.steer(25).hold_ms(250).steer(-25).hold_ms(250)
        })
        .steer(0)
        .tilt(0)
}

fn celebrate(spec: ActionSpec) -> ActionSpec {
    (0..2)
        .fold(spec.tilt(20), |s, _| {
            s.pan(-30).steer(-20).hold_ms(200).pan(30).steer(20).hold_ms(200)
        })
        .pan(0)
        .tilt(0)
        .steer(0)
}

/// Pan-angle cursor for the scanning sweep.
///
/// The angle moves `step` degrees per tick and reverses exactly when it lands
/// on `±bound`, so it never leaves the closed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepState {
    angle: i32,
    direction: i32,
    step: i32,
    bound: i32,
}

impl SweepState {
    pub fn new(step: i32, bound: i32) -> Self {
        Self {
            angle: 0,
            direction: 1,
            step: step.abs().max(1),
            bound: bound.abs(),
        }
    }

    pub fn angle(&self) -> i32 {
        self.angle
    }

    /// Move one tick and return the new angle.
    pub fn advance(&mut self) -> i32 {
        self.angle += self.step * self.direction;
        if self.angle >= self.bound {
            self.angle = self.bound;
            self.direction = -1;
        } else if self.angle <= -self.bound {
            self.angle = -self.bound;
            self.direction = 1;
        }
        self.angle
    }
}

impl From<&Sweep> for SweepState {
    fn from(sweep: &Sweep) -> Self {
        Self::new(sweep.step, sweep.bound)
    }
}

#[cfg(test)]
mod tests {
    use okbot_types::{ActuatorOp, Step};

    use super::*;

    #[test]
    fn longest_keyword_wins() {
        let lib = ActionLibrary::default();
        assert_eq!(
            lib.longest_substring("please turn left now"),
            Some(("turn left", Action::TurnLeft))
        );
        assert_eq!(
            lib.longest_substring("can you spin around twice"),
            Some(("spin around", Action::SpinAround))
        );
        assert_eq!(lib.longest_substring("tell me a joke"), None);
    }

    #[test]
    fn equal_length_ties_keep_table_order() {
        let lib = ActionLibrary::default();
        // "nod" and "sad" are both three letters; "nod" comes first.
        assert_eq!(lib.longest_substring("sad nod").map(|(k, _)| k), Some("nod"));
    }

    #[test]
    fn exact_lookup_accepts_aliases_and_canonical_names() {
        let lib = ActionLibrary::default();
        assert_eq!(lib.lookup_exact("back up"), Some(Action::Backward));
        assert_eq!(lib.lookup_exact("party"), Some(Action::Celebrate));
        assert_eq!(lib.lookup_exact("turn_left"), Some(Action::TurnLeft));
        assert_eq!(lib.lookup_exact("turn left please"), None);
    }

    #[test]
    fn every_action_has_a_keyword() {
        let lib = ActionLibrary::default();
        for action in Action::ALL {
            assert!(
                lib.keywords().any(|(_, a)| a == action),
                "{action} has no keyword"
            );
        }
    }

    #[test]
    fn turn_left_steers_negative_then_recentres() {
        let lib = ActionLibrary::default();
        let ops: Vec<ActuatorOp> = lib.script(Action::TurnLeft).ops().collect();
        assert_eq!(
            ops,
            vec![
                ActuatorOp::Steer(-25),
                ActuatorOp::Forward(30),
                ActuatorOp::Stop,
                ActuatorOp::Steer(0)
            ]
        );
    }

    #[test]
    fn motion_profile_parameterizes_drive_scripts() {
        let lib = ActionLibrary::new(MotionProfile {
            speed: 50,
            duration: Duration::from_millis(400),
            turn_angle: 10,
        });
        let spec = lib.script(Action::Forward);
        assert_eq!(
            spec.steps,
            vec![
                Step::Op(ActuatorOp::Steer(0)),
                Step::Op(ActuatorOp::Forward(50)),
                Step::Hold(Duration::from_millis(400)),
                Step::Op(ActuatorOp::Stop),
            ]
        );
        assert!(lib.script(Action::TurnRight).ops().any(|op| op == ActuatorOp::Steer(10)));
    }

    #[test]
    fn patrol_contains_one_bounded_sweep() {
        let lib = ActionLibrary::default();
        let spec = lib.script(Action::Patrol);
        let sweeps: Vec<&Sweep> = spec
            .steps
            .iter()
            .filter_map(|s| match s {
                Step::Sweep(sw) => Some(sw),
                _ => None,
            })
            .collect();
        assert_eq!(sweeps.len(), 1);
        assert_eq!(sweeps[0].bound, 45);
        assert_eq!(spec.ops().last(), Some(ActuatorOp::Pan(0)));
    }

    #[test]
    fn reset_ends_neutral() {
        let lib = ActionLibrary::default();
        let ops: Vec<ActuatorOp> = lib.script(Action::Reset).ops().collect();
        assert_eq!(ops, ActionSpec::neutral().ops().collect::<Vec<_>>());
    }

    #[test]
    fn sweep_reverses_at_bound_not_past_it() {
        let mut sweep = SweepState::new(5, 45);
        let angles: Vec<i32> = (0..12).map(|_| sweep.advance()).collect();
        assert_eq!(angles, vec![5, 10, 15, 20, 25, 30, 35, 40, 45, 40, 35, 30]);
        assert!(!angles.contains(&50));
    }

    #[test]
    fn sweep_stays_within_bounds_over_many_ticks() {
        let mut sweep = SweepState::new(5, 45);
        let mut hit_negative = false;
        for _ in 0..200 {
            let a = sweep.advance();
            assert!((-45..=45).contains(&a));
            hit_negative |= a == -45;
        }
        assert!(hit_negative);
    }

    #[test]
    fn sweep_with_uneven_step_clamps_to_bound() {
        let mut sweep = SweepState::new(20, 45);
        assert_eq!(sweep.advance(), 20);
        assert_eq!(sweep.advance(), 40);
        assert_eq!(sweep.advance(), 45);
        assert_eq!(sweep.advance(), 25);
    }
}
