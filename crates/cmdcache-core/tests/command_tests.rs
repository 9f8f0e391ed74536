//! Tests for command unit encoding and decoding.

use glam::Vec4;

use cmdcache_core::gpu::command::{next_unit_offset, value_offset};
use cmdcache_core::gpu::encode::component_words;
use cmdcache_core::gpu::registers::{self, UniformWindow};
use cmdcache_core::gpu::{CommandEncoder, CommandHeader, CommandIter, RegisterWrite};

mod header_tests {
    use super::*;

    #[test]
    fn single_header_fields() {
        let header = CommandHeader::single(0x2C0);
        assert_eq!(header.to_raw(), 0x000F_02C0);
        assert_eq!(header.addr(), 0x2C0);
        assert_eq!(header.byte_enable(), 0xF);
        assert!(!header.is_burst());
        assert_eq!(header.value_count(), 1);
    }

    #[test]
    fn burst_header_fields() {
        let header = CommandHeader::burst(0x2C1, 16, false);
        assert_eq!(header.to_raw(), 0x00FF_02C1);
        assert_eq!(header.extra(), 15);
        assert!(!header.sequential());

        let header = CommandHeader::burst(0x2C1, 4, true);
        assert_eq!(header.to_raw(), 0x803F_02C1);
        assert!(header.sequential());
    }

    #[test]
    fn setters_preserve_other_fields() {
        let mut header = CommandHeader::burst(0x1234, 3, true);
        header.set_byte_enable(0x3);
        header.set_addr(0x42);

        assert_eq!(header.addr(), 0x42);
        assert_eq!(header.byte_enable(), 0x3);
        assert_eq!(header.value_count(), 3);
        assert!(header.sequential());
    }

    #[test]
    #[should_panic(expected = "does not fit a command header")]
    fn oversized_burst() {
        let _ = CommandHeader::burst(0, 129, false);
    }
}

mod layout_tests {
    use super::*;

    #[test]
    fn unit_sizes() {
        assert_eq!(next_unit_offset(0, CommandHeader::single(0)), 8);
        // 2 values: 12 bytes, padded
        assert_eq!(next_unit_offset(0, CommandHeader::burst(0, 2, true)), 16);
        // 3 values: 16 bytes
        assert_eq!(next_unit_offset(8, CommandHeader::burst(0, 3, true)), 24);
        // 16 values: 68 bytes, padded
        assert_eq!(next_unit_offset(0, CommandHeader::burst(0, 16, false)), 72);
    }

    #[test]
    fn value_offsets_skip_the_header() {
        assert_eq!(value_offset(0x10, 0), 0x10);
        assert_eq!(value_offset(0x10, 1), 0x18);
        assert_eq!(value_offset(0x10, 2), 0x1C);
    }

    #[test]
    fn encoder_output_is_unit_aligned() {
        let mut enc = CommandEncoder::new();
        for count in 1..=9 {
            let values: Vec<u32> = (0..count).collect();
            enc.burst(0x100, &values);
            assert_eq!(enc.len() % 8, 0, "after a burst of {count}");
        }
    }

    #[test]
    fn decoded_writes_follow_burst_mode() {
        let mut enc = CommandEncoder::new();
        enc.burst(0x10, &[1, 2, 3]).burst_repeat(0x20, &[4, 5]);

        let bytes = enc.as_bytes();
        let writes: Vec<RegisterWrite> = CommandIter::new(bytes, 0, bytes.len()).writes().collect();
        let addresses: Vec<(u16, u32)> = writes.iter().map(|w| (w.address, w.value)).collect();
        assert_eq!(
            addresses,
            vec![(0x10, 1), (0x11, 2), (0x12, 3), (0x20, 4), (0x20, 5)]
        );
        assert_eq!(writes[3].offset, 0x10);
        assert_eq!(writes[4].offset, 0x18);
    }

    #[test]
    fn raw_command_values() {
        let mut enc = CommandEncoder::new();
        enc.burst_repeat(0x20, &[7, 8, 9]);

        let bytes = enc.as_bytes();
        let command = CommandIter::new(bytes, 0, bytes.len()).next().unwrap();
        assert_eq!(command.offset(), 0);
        assert_eq!(command.header().value_count(), 3);
        assert_eq!(command.value(0), 7);
        assert_eq!(command.value(2), 9);
    }
}

mod uniform_tests {
    use super::*;

    #[test]
    fn index_select_value() {
        assert_eq!(registers::uniform_index_select(5, true), 0x8000_0005);
        assert_eq!(registers::uniform_index_select(5, false), 5);
    }

    #[test]
    fn component_words_are_reversed() {
        let words = component_words(Vec4::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(
            words,
            [4f32.to_bits(), 3f32.to_bits(), 2f32.to_bits(), 1f32.to_bits()]
        );
    }

    #[test]
    fn uniform_vec4_encoding() {
        let mut enc = CommandEncoder::new();
        enc.uniform_vec4(9, Vec4::new(1.0, 2.0, 3.0, 4.0));

        let bytes = enc.as_bytes();
        let writes: Vec<RegisterWrite> = CommandIter::new(bytes, 0, bytes.len()).writes().collect();
        let window = UniformWindow::VERTEX_SHADER;

        assert_eq!(writes.len(), 5);
        assert!(window.is_index_select(writes[0].address));
        assert_eq!(writes[0].value, 0x8000_0009);
        assert!(writes[1..].iter().all(|w| w.address == window.value_begin));
        assert_eq!(f32::from_bits(writes[1].value), 4.0);
        assert_eq!(f32::from_bits(writes[4].value), 1.0);
    }

    #[test]
    fn window_bounds() {
        let window = UniformWindow::default();
        assert!(window.is_value(0x2C1));
        assert!(window.is_value(0x2C8));
        assert!(!window.is_value(0x2C0));
        assert!(!window.is_value(0x2C9));
    }
}
