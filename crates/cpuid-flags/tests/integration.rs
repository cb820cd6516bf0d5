//! Parse/serialize round trips and end-to-end evaluation.

use cpuid_core::{Leaves, Processor, Register, RegisterSet};
use cpuid_flags::{evaluate, parse, serialize, BitRange, FlagError, FlagSelector, FlagValue};

const INPUTS: &[&str] = &[
    "CPUID.01H:EDX.SSE2[bit 26]",
    "CPUID.(EAX=07H,ECX=0):EBX.AVX2[bit 5]",
    "CPUID.(EAX=07H,ECX=1):EAX.AVX_VNNI[bit 4]",
    "CPUID.01H:EAX[bits 11:8]",
    "CPUID.extended_features:EBX[bit 9]",
    "CPUID.80000001H:ECX",
    "cpuid . ( eax = 0x1f , ecx = 2 ) : edx",
    "CPUID.0DH:EAX.xsave_size[bits 31:0]",
    "CPUID.(EAX=0AH,ECX=0AH):ECX[bit 31]",
    "CPUID.4294967295:EDX[bit 0]",
];

#[test]
fn parse_serialize_round_trip() {
    for input in INPUTS {
        let selector = parse(input).unwrap_or_else(|err| panic!("{input}: {err}"));
        let text = serialize(&selector);
        assert_eq!(parse(&text).unwrap(), selector, "{input} -> {text}");
        // canonical text is a fixed point
        assert_eq!(serialize(&parse(&text).unwrap()), text);
    }
}

#[test]
fn canonical_text() {
    let cases = [
        ("cpuid.01h:edx.sse2[bit 26]", "CPUID.1H:EDX.sse2[bit 26]"),
        ("CPUID.(EAX=07H,ECX=0):EBX.AVX2[bit 5]", "CPUID.7H:EBX.AVX2[bit 5]"),
        ("CPUID.(EAX=7,ECX=16):EBX", "CPUID.(EAX=7H,ECX=10H):EBX"),
        ("CPUID.extended_topology:EDX", "CPUID.0BH:EDX"),
        ("CPUID.1:EAX[bits 3:3]", "CPUID.1H:EAX[bit 3]"),
        ("CPUID.0x8000001E:EBX[bits 15:8]", "CPUID.8000001EH:EBX[bits 15:8]"),
    ];
    for (input, canonical) in cases {
        assert_eq!(parse(input).unwrap().to_string(), canonical);
    }
}

#[test]
fn constructed_selectors_round_trip() {
    let selectors = [
        FlagSelector::new(0xD, Register::Ecx).with_subleaf(0xFFFF_FFFF),
        FlagSelector::new(0x8000_0008, Register::Eax).with_bits(BitRange { low: 0, high: 31 }),
        FlagSelector::new(0, Register::Ebx).with_name("vendor_0"),
    ];
    for selector in selectors {
        let text = selector.to_string();
        assert_eq!(text.parse::<FlagSelector>().unwrap(), selector);
    }
}

#[test]
fn malformed_selectors_fail() {
    for input in [
        "",
        "CPUID",
        "CPUID.",
        "CPUID.01H",
        "CPUID.01H:",
        "CPUID.01H:EDX.",
        "CPUID.01H:EDX[",
        "CPUID.01H:EDX[bit]",
        "CPUID.01H:EDX[bit 1",
        "CPUID.(EAX=01H:EDX",
        "CPUID.(ECX=1):EDX",
        "CPUID.01H:EDX[bits 1]",
        "CPUID.01H:EDX[bytes 1]",
        "CPUID.ZZH:EDX",
        "XCPUID.01H:EDX",
        "CPUID.01H:EDX.SSE2.SSE3",
        "CPUID.4000_0000:EBX",
    ] {
        assert!(parse(input).is_err(), "{input} should not parse");
    }
}

#[test]
fn error_identifies_token() {
    let err = parse("CPUID.01H:EDX[bit 40]").unwrap_err();
    assert_eq!(err, FlagError::BitOutOfRange { position: 18, bit: 40 });
    assert_eq!(err.position(), Some(18));
}

#[test]
fn flag_bit_zero_of_leaf_one() {
    let selector = parse("CPUID.01H:EDX.FPU[bit 0]").unwrap();

    let set = Processor::new(0, Leaves::new().with(1, 0, RegisterSet::new(0, 0, 0, 1)));
    let clear = Processor::new(1, Leaves::new().with(1, 0, RegisterSet::new(0, 0, 0, 0xFFFF_FFFE)));
    let absent = Processor::new(2, Leaves::new().with(0, 0, RegisterSet::new(1, 0, 0, 0)));

    assert_eq!(evaluate(&selector, &set), FlagValue::Bit(true));
    assert!(evaluate(&selector, &set).is_set());
    assert_eq!(evaluate(&selector, &clear), FlagValue::Bit(false));
    assert!(!evaluate(&selector, &clear).is_set());
    assert_eq!(evaluate(&selector, &absent), FlagValue::NotPresent);
}

#[test]
fn unknown_leaves_stay_expressible() {
    let selector = parse("CPUID.(EAX=0DEADH,ECX=3):EAX[bits 7:0]").unwrap();
    let cpu = Processor::new(
        0,
        Leaves::new().with(0xDEAD, 3, RegisterSet::new(0x1234_5678, 0, 0, 0)),
    );
    assert_eq!(evaluate(&selector, &cpu), FlagValue::Field(0x78));
    assert_eq!(selector.to_string(), "CPUID.(EAX=0DEADH,ECX=3H):EAX[bits 7:0]");
}
