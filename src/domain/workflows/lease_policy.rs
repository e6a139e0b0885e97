use std::time::Duration;

const MIN_RESERVATION: Duration = Duration::from_secs(2);

/// Keep-alive cadence for a reservation.
///
/// The interval is always strictly less than half the reservation timeout, so
/// one missed tick still leaves the reservation alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    reservation_timeout: Duration,
    keep_alive_interval: Duration,
}

impl LeasePolicy {
    pub fn new(reservation_timeout: Duration, requested_interval: Duration) -> Self {
        let reservation_timeout = reservation_timeout.max(MIN_RESERVATION);
        let half = reservation_timeout / 2;
        let keep_alive_interval = if requested_interval.is_zero() || requested_interval >= half {
            half.mul_f64(0.9)
        } else {
            requested_interval
        };

        Self {
            reservation_timeout,
            keep_alive_interval,
        }
    }

    pub fn reservation_timeout(&self) -> Duration {
        self.reservation_timeout
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }
}
