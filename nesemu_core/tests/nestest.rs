use nesemu_core::Nes;

const ROM: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/roms/nestest.nes");
const LOG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/roms/nestest.log");
const LAST_CYCLE: u64 = 8991;

/// `(pc, a, x, y, p, sp, cycles)` from a nestest log line or a trace line
fn fields(line: &str) -> Option<(String, String, String, String, String, String, u64)> {
    let field = |tag: &str| -> Option<String> {
        let start = line.find(tag)? + tag.len();
        Some(line[start..].split_whitespace().next()?.to_owned())
    };
    Some((
        line.get(..4)?.to_owned(),
        field("A:")?,
        field("X:")?,
        field("Y:")?,
        field("P:")?,
        field("SP:")?,
        field("CYC:")?.parse().ok()?,
    ))
}

/// Needs the nestest ROM and its reference log, which are not redistributed
/// here. Fetch them into `tests/roms/` and run with `--ignored`:
///
/// ```text
/// curl -o nesemu_core/tests/roms/nestest.nes https://www.qmtpro.com/~nes/misc/nestest.nes
/// curl -o nesemu_core/tests/roms/nestest.log https://www.qmtpro.com/~nes/misc/nestest.log
/// cargo test -p nesemu_core --test nestest -- --ignored
/// ```
#[test]
#[ignore = "needs tests/roms/nestest.{nes,log}"]
fn nestest_automation() {
    let log = std::fs::read_to_string(LOG).unwrap();
    let mut nes = Nes::load(ROM).unwrap();
    nes.cpu_mut().set_pc(0xc000);
    while !nes.cpu().at_instruction_boundary() {
        nes.tick();
    }

    for (n, expected) in log.lines().enumerate() {
        let expected = fields(expected).unwrap();
        if expected.6 > LAST_CYCLE {
            break;
        }
        let trace = nes.trace();
        assert_eq!(fields(&trace), Some(expected), "line {}: {}", n + 1, trace);
        nes.step_instruction();
    }
}
