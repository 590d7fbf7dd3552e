#![no_main]

use backup_controller_core::{parse_action_row, parse_command};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    // Must never panic, only reject.
    let _ = parse_action_row(line);
    if let Ok(op) = parse_command(line) {
        // A parsed operation re-parses to itself from its own command line.
        let again = parse_command(&op.command_line()).expect("command_line must parse back");
        assert_eq!(again, op);
    }
});
