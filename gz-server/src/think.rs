//! Per-request think-time budgeting.

/// Time fields accepted on a `/get-move` request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThinkRequest {
    pub force_think_time_ms: Option<u64>,
    pub time_left_ms: Option<u64>,
    pub turn_limit_ms: Option<u64>,
    pub turn_ends_at_ms: Option<u64>,
}

const MIN_THINK_MS: u64 = 200;
const MAX_THINK_MS: u64 = 5_000;
const SAFETY_MARGIN_MS: f64 = 200.0;

fn phase_fraction(move_count: usize) -> f64 {
    match move_count {
        0..=6 => 0.35,
        7..=30 => 0.55,
        _ => 0.5,
    }
}

fn static_default(move_count: usize) -> u64 {
    match move_count {
        0..=6 => 1_500,
        7..=30 => 3_000,
        _ => 1_500,
    }
}

/// Parse a "base+increment" control ("5+1" = five minutes plus one second)
/// into an approximate per-move allowance.
fn time_control_per_move(control: &str) -> Option<f64> {
    let (base, inc) = control.split_once('+')?;
    let base_min: f64 = base.trim().parse().ok()?;
    let inc_s: f64 = inc.trim().parse().ok()?;
    // A game of this kind runs roughly forty moves per side.
    Some(base_min * 60_000.0 / 40.0 + inc_s * 1_000.0)
}

/// Decide the search budget for one request.
///
/// Priority: an explicit override, then real clock information (time left,
/// turn limit, turn end timestamp), then the configured approximate time
/// control, then static phase defaults.
pub fn compute_think_time(
    req: ThinkRequest,
    move_count: usize,
    time_control: &str,
    now_ms: u64,
) -> u64 {
    if let Some(forced) = req.force_think_time_ms {
        return forced.clamp(MIN_THINK_MS, MAX_THINK_MS);
    }

    let available = req
        .time_left_ms
        .or(req.turn_limit_ms)
        .or_else(|| req.turn_ends_at_ms.map(|t| t.saturating_sub(now_ms)));
    if let Some(available) = available {
        let budget = available as f64 * phase_fraction(move_count) - SAFETY_MARGIN_MS;
        return (budget.max(0.0) as u64).clamp(MIN_THINK_MS, MAX_THINK_MS);
    }

    if let Some(per_move) = time_control_per_move(time_control) {
        let budget = per_move - SAFETY_MARGIN_MS;
        return (budget.max(0.0) as u64).clamp(MIN_THINK_MS, MAX_THINK_MS);
    }

    static_default(move_count)
}
