use std::sync::OnceLock;

/// Which pipeline phases emit diagnostics, parsed once from the `MOMO_TRACE`
/// environment variable. The crate has exactly two traced phases: `compile`
/// (post-compile disassembly dump) and `vm` (per-instruction dispatch).
///
/// `MOMO_TRACE=1` turns both on; `MOMO_TRACE=compile` or `MOMO_TRACE=vm`
/// (or a comma list) selects individually. Unset, empty or `0` disables
/// tracing. Unknown phase names are ignored.
#[derive(Default)]
struct Phases {
    compile: bool,
    vm: bool,
}

static PHASES: OnceLock<Phases> = OnceLock::new();

fn phases() -> &'static Phases {
    PHASES.get_or_init(|| {
        let var = std::env::var("MOMO_TRACE").unwrap_or_default();
        match var.as_str() {
            "" | "0" => Phases::default(),
            "1" => Phases {
                compile: true,
                vm: true,
            },
            list => {
                let mut phases = Phases::default();
                for name in list.split(',') {
                    match name.trim() {
                        "compile" => phases.compile = true,
                        "vm" => phases.vm = true,
                        _ => {}
                    }
                }
                phases
            }
        }
    })
}

pub fn is_enabled(phase: &str) -> bool {
    let phases = phases();
    match phase {
        "compile" => phases.compile,
        "vm" => phases.vm,
        _ => false,
    }
}

macro_rules! trace_log {
    ($phase:expr, $($arg:tt)*) => {
        if $crate::trace::is_enabled($phase) {
            eprintln!("momo trace [{}] {}", $phase, format!($($arg)*));
        }
    };
}
pub(crate) use trace_log;
