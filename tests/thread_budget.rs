//! Environment mutation lives in its own test binary so no other test
//! observes the variables changing underneath it.

use qsweep::thread_budget::{THREAD_CAP_VARS, ThreadBudget, check_oversubscription};
use system_profile::SystemProfile;

#[test]
fn test_apply_sets_every_cap_and_is_idempotent() {
    let budget = ThreadBudget::new(2);
    budget.apply();

    for var in THREAD_CAP_VARS {
        assert_eq!(std::env::var(var).as_deref(), Ok("2"), "{var}");
    }
    assert_eq!(ThreadBudget::current(), Some(budget));
    assert_eq!(rayon::current_num_threads(), 2);

    // Second application changes nothing, including the already-built rayon pool
    budget.apply();
    ThreadBudget::new(5).apply();
    assert_eq!(ThreadBudget::current(), Some(ThreadBudget::new(5)));
    assert_eq!(rayon::current_num_threads(), 2);

    // One worker at five threads each fits on any machine with five cores
    assert_eq!(check_oversubscription(1), SystemProfile::cpu_count() >= 5);
}
