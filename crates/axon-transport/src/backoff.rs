const RECONNECT_BACKOFF_MS: &[u64] = &[500, 1_000, 2_000, 5_000, 15_000, 30_000];

pub fn reconnect_delay_ms(consecutive_failures: u32) -> u64 {
    let idx = (consecutive_failures.saturating_sub(1) as usize).min(RECONNECT_BACKOFF_MS.len() - 1);
    RECONNECT_BACKOFF_MS[idx]
}
