#![no_main]

use libfuzzer_sys::fuzz_target;
use objsync::CharBuffer;

// Each input byte is one operation: 0 clears, anything else appends that many characters.
fuzz_target!(|data: &[u8]| {
    let mut buffer = CharBuffer::new();
    let mut expected: Vec<char> = Vec::new();

    for &op in data {
        if op == 0 {
            let capacity = buffer.capacity();
            buffer.clear();
            expected.clear();
            assert_eq!(buffer.capacity(), capacity);
            continue;
        }

        let chunk: Vec<char> = (0..op).map(|i| char::from(b'a' + i % 26)).collect();
        let before = buffer.capacity();
        let len = buffer.append(&chunk);
        expected.extend_from_slice(&chunk);

        assert_eq!(len, expected.len());
        assert!(buffer.len() <= buffer.capacity());
        if len > before {
            assert_eq!(buffer.capacity(), len.max(before * 2));
        } else {
            assert_eq!(buffer.capacity(), before);
        }
        assert_eq!(buffer.as_slice(), expected.as_slice());
    }
});
