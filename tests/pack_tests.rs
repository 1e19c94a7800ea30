//! Zero-pack tests: block fixtures, literal runs, sizing semantics.

use sproto_core::pack::{pack, pack_to_vec, unpack, unpack_to_vec};

#[test]
fn sparse_blocks_become_mask_plus_bytes() {
    let input = [
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
        0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let packed = pack_to_vec(&input);
    assert_eq!(packed, vec![0x01, 0x01, 0x01, 0x02]);
    assert_eq!(unpack_to_vec(&packed).unwrap(), input);
}

#[test]
fn mixed_positions_set_mask_bits() {
    let input = [
        0x08, 0x00, 0x00, 0x00, 0x03, 0x00, 0x02, 0x00, //
        0x19, 0x00, 0x00, 0x00, 0xaa, 0x01, 0x00, 0x00,
    ];
    let packed = pack_to_vec(&input);
    assert_eq!(packed, vec![0x51, 0x08, 0x03, 0x02, 0x31, 0x19, 0xaa, 0x01]);
    assert_eq!(unpack_to_vec(&packed).unwrap(), input);
}

#[test]
fn all_zeros_collapse_to_masks() {
    let zeros = [0u8; 24];
    let packed = pack_to_vec(&zeros);
    assert_eq!(packed, vec![0x00, 0x00, 0x00]);
    assert_eq!(unpack_to_vec(&packed).unwrap(), zeros);
}

#[test]
fn empty_input() {
    assert_eq!(pack_to_vec(&[]), Vec::<u8>::new());
    assert_eq!(unpack_to_vec(&[]).unwrap(), Vec::<u8>::new());
}

#[test]
fn dense_blocks_become_a_literal_run() {
    // 30 non-zero bytes: three full blocks plus a 6-of-8 trailer that
    // joins the run because one is already open
    let input = vec![0x8a; 30];
    let packed = pack_to_vec(&input);
    assert_eq!(packed[0], 0xFF);
    assert_eq!(packed[1], 3); // 4 blocks
    assert_eq!(packed.len(), 2 + 32);

    let mut expected = input.clone();
    expected.extend_from_slice(&[0, 0]);
    assert_eq!(unpack_to_vec(&packed).unwrap(), expected);
}

#[test]
fn six_nonzero_bytes_alone_stay_masked() {
    // a standalone 6-of-8 block is cheaper as mask + bytes
    let input = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00, 0x00];
    let packed = pack_to_vec(&input);
    assert_eq!(packed, vec![0x3f, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    assert_eq!(unpack_to_vec(&packed).unwrap(), input);
}

#[test]
fn run_caps_at_256_blocks() {
    let input = vec![0x5au8; 257 * 8];
    let packed = pack_to_vec(&input);
    // one full run, then a fresh run of one block
    assert_eq!(packed.len(), 2 + 256 * 8 + 2 + 8);
    assert_eq!(packed[0], 0xFF);
    assert_eq!(packed[1], 255);
    assert_eq!(packed[2 + 256 * 8], 0xFF);
    assert_eq!(packed[2 + 256 * 8 + 1], 0);
    assert_eq!(unpack_to_vec(&packed).unwrap(), input);
}

#[test]
fn trailing_partial_block_is_zero_padded() {
    let input = [0x01, 0x02, 0x03]; // 3 bytes, pads to one block
    let packed = pack_to_vec(&input);
    assert_eq!(packed, vec![0x07, 0x01, 0x02, 0x03]);

    let unpacked = unpack_to_vec(&packed).unwrap();
    assert_eq!(unpacked, vec![0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn literal_run_pads_only_with_real_bytes() {
    // 12 dense bytes: one full literal block, then a 4-of-8 masked block
    let input = [
        0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, //
        0x99, 0xaa, 0xbb, 0xcc,
    ];
    let packed = pack_to_vec(&input);
    assert_eq!(packed[0], 0xFF);
    assert_eq!(packed[1], 0);
    assert_eq!(&packed[2..10], &input[..8]);
    assert_eq!(&packed[10..], &[0x0f, 0x99, 0xaa, 0xbb, 0xcc]);

    let unpacked = unpack_to_vec(&packed).unwrap();
    assert_eq!(&unpacked[..12], &input[..]);
    assert_eq!(&unpacked[12..], &[0, 0, 0, 0]);
}

#[test]
fn pack_reports_size_with_undersized_destination() {
    let input = vec![0x8a; 30];
    let expected = pack_to_vec(&input).len();

    assert_eq!(pack(&input, &mut []), expected);
    let mut tiny = [0u8; 3];
    assert_eq!(pack(&input, &mut tiny), expected);
}

#[test]
fn unpack_reports_size_with_undersized_destination() {
    let packed = pack_to_vec(&[0x01u8; 64]);
    assert_eq!(unpack(&packed, &mut []).unwrap(), 64);
    let mut tiny = [0u8; 5];
    assert_eq!(unpack(&packed, &mut tiny).unwrap(), 64);
}

#[test]
fn unpack_rejects_corrupt_streams() {
    // literal-run header with no count byte
    assert!(unpack_to_vec(&[0xFF]).is_err());
    // literal run promising more bytes than remain
    assert!(unpack_to_vec(&[0xFF, 0x01, 0x00]).is_err());
    // bitmask promising a byte the input does not have
    assert!(unpack_to_vec(&[0x01]).is_err());
}

#[test]
fn unpack_after_pack_is_identity_up_to_padding() {
    for len in [1usize, 7, 8, 9, 15, 16, 17, 63, 100] {
        let input: Vec<u8> = (0..len).map(|i| (i * 37 % 256) as u8).collect();
        let unpacked = unpack_to_vec(&pack_to_vec(&input)).unwrap();
        let padded = (len + 7) / 8 * 8;
        assert_eq!(unpacked.len(), padded);
        assert_eq!(&unpacked[..len], &input[..]);
        assert!(unpacked[len..].iter().all(|&b| b == 0));
    }
}
