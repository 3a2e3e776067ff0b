#![no_main]
use cidrtree::IpTable;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a prefix list: must error cleanly, never panic
    let Ok(mut table) = IpTable::new() else {
        return;
    };
    let _ = table.load_text(data);

    if let Ok(text) = std::str::from_utf8(data) {
        for token in text.split_whitespace().take(16) {
            let _ = table.lookup_str(token);
            let _ = table.remove_cidr(token);
        }
    }
});
