/*!
Character controller defaults and tolerances.

These constants centralize the parameters used by the velocity integrator,
the stepping stages, and penetration recovery. Keeping them together makes
tuning easier and helps ensure deterministic behavior across platforms.

Notes
- Distances are in meters, time in seconds, angles in radians unless noted.
- Favor practical world-space tolerances over machine epsilon for robust
  behavior.
- These are defaults for [`crate::character::CharacterConfig`]; override per
  character from your game data.
*/

/// Gravity magnitude in meters per second squared (positive value).
/// The stock value is a deliberately snappy 3G.
pub const DEFAULT_GRAVITY: f32 = 9.8 * 3.0;

/// Terminal fall speed in meters per second (roughly a sky diver).
pub const DEFAULT_FALL_SPEED: f32 = 55.0;

/// Default jump takeoff speed in meters per second.
pub const DEFAULT_JUMP_SPEED: f32 = 10.0;

/// Default maximum walkable slope angle.
pub const DEFAULT_MAX_SLOPE: f32 = std::f32::consts::FRAC_PI_4;

/// Default maximum speed for every movement regime (m/s).
pub const DEFAULT_MAX_SPEED: f32 = 5.0;

/// Default acceleration for every movement regime (m/s^2).
pub const DEFAULT_ACCELERATION: f32 = 5.0;

/// Ground friction coefficient applied per tick to the horizontal velocity.
pub const DEFAULT_FRICTION: f32 = 0.1;

/// Air drag coefficient applied per tick to the full velocity.
pub const DEFAULT_DRAG: f32 = 0.01;

/// Penetrations deeper than this are pushed out by recovery (meters).
pub const DEFAULT_MAX_PENETRATION_DEPTH: f32 = 0.2;

/// Extra collision margin added to the proxy during the forward sweep
/// (meters). Too large creates visible gaps; too small risks tunneling at
/// glancing angles.
pub const DEFAULT_ADDED_MARGIN: f32 = 0.02;

/// Maximum iterations of the forward sweep-and-slide loop per tick.
pub const MAX_SLIDE_ITERATIONS: u32 = 10;

/// The slide loop stops once the remaining sweep fraction drops below this.
pub const MIN_SLIDE_FRACTION: f32 = 0.01;

/// Maximum penetration recovery passes per call site. Exceeding the cap
/// accepts the residual penetration rather than retrying indefinitely.
pub const MAX_RECOVERY_ITERATIONS: u32 = 4;

/// Fraction of each excess penetration depth corrected per recovery pass.
pub const RECOVERY_FRACTION: f32 = 0.2;

/// Scale of the ad-hoc push applied to dynamic bodies the character walks
/// into. Not a physically derived friction model.
pub const REACTION_FORCE_SCALE: f32 = 100.0;

/// Practical small distance for comparisons (meters).
/// Use for dot-product guards, equality checks in world space, etc.
pub const DIST_EPS: f32 = 1.0e-6;

/// Minimum squared movement threshold to consider a sweep meaningful (m^2).
/// Movements below this are treated as zero to avoid tiny oscillations.
pub const MIN_MOVE_SQ: f32 = 1.0e-8;

/// Margin added when inflating swept AABBs for broad-phase candidate
/// queries (meters). Conservatively includes near misses.
pub const BROAD_PHASE_MARGIN: f32 = 0.1;

/// Prediction distance for discrete contact generation (meters). Contacts
/// separated by more than this are not reported.
pub const CONTACT_PREDICTION: f32 = 0.05;
