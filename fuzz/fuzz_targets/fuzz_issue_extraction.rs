#![no_main]
use kairos::agent::{IssueRecord, ISSUE_FIELDS};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let record = IssueRecord::from_model_output(s);
        let fields = record.fields();
        assert_eq!(fields.len(), ISSUE_FIELDS.len());
        for ((name, value), expected) in fields.iter().zip(ISSUE_FIELDS) {
            assert_eq!(*name, expected);
            assert!(!value.is_empty());
        }
        let _ = record.to_pretty_json();
    }
});
