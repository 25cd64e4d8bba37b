//! The `priorities` command

use tempo_scheduler::Priority;

/// Print every level with its bin index, most urgent first.
pub fn execute() {
    for priority in Priority::ALL {
        if priority.is_dispatchable() {
            println!("{}  {}", priority.index(), priority);
        } else {
            println!("{}  {} (held until unblocked)", priority.index(), priority);
        }
    }
}
