//! Property: the device receives exactly the concatenation of all writes, in
//! call order, with no loss or duplication.

mod common;

use common::{
    blocking_port, device_runtime, fast_config, open_duplex_port, read_from_device, wait_until,
    WAIT,
};
use proptest::prelude::*;

fn arb_writes() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 1..48), 1..32)
}

fn expected_len(writes: &[Vec<u8>]) -> u64 {
    writes.iter().map(|w| w.len() as u64).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Queued writes reach the device as one ordered byte stream.
    #[test]
    fn prop_event_loop_preserves_write_order(writes in arb_writes(), capacity in 1usize..64) {
        let runtime = device_runtime();
        let (port, _peers, mut peer) = open_duplex_port(capacity);

        for chunk in &writes {
            port.write(chunk);
        }
        let expected = writes.concat();
        let received = read_from_device(&runtime, &mut peer, expected.len());
        prop_assert_eq!(received, expected);

        // Completion is accounted after the device has taken the bytes.
        let total = expected_len(&writes);
        prop_assert!(wait_until(WAIT, || port.stats().bytes_written == total));
        prop_assert!(port.stats().transmissions <= writes.len() as u64);
        prop_assert!(port.close().is_ok());
    }

    /// Synchronous writes reach the device one call at a time, in order.
    #[test]
    fn prop_blocking_preserves_write_order(writes in arb_writes()) {
        let (device, port) = blocking_port("MOCK0");
        port.open("MOCK0", &fast_config()).unwrap();

        for chunk in &writes {
            port.write(chunk);
        }
        prop_assert!(port.close().is_ok());
        prop_assert_eq!(device.get_write_log(), writes);
    }
}
