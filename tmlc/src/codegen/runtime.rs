//! Runtime support symbols (§6): every `declare` line the emitted module
//! might reference, grouped by category. `declare_used` only prints the
//! symbols actually touched during emission — `Emitter::declared_externs`
//! is populated as codegen lowers the operations that need them (string
//! concatenation, list/map/buffer/text builtins, panics, allocation).

use std::collections::HashSet;

struct RuntimeDecl {
    name: &'static str,
    signature: &'static str,
}

const MEMORY: &[RuntimeDecl] = &[
    RuntimeDecl { name: "tml_alloc", signature: "declare ptr @tml_alloc(i64)" },
    RuntimeDecl { name: "tml_realloc", signature: "declare ptr @tml_realloc(ptr, i64)" },
    RuntimeDecl { name: "tml_free", signature: "declare void @tml_free(ptr)" },
    RuntimeDecl { name: "tml_retain", signature: "declare void @tml_retain(ptr)" },
    RuntimeDecl { name: "tml_release", signature: "declare void @tml_release(ptr)" },
];

const STRING: &[RuntimeDecl] = &[
    RuntimeDecl { name: "tml_str_concat", signature: "declare ptr @tml_str_concat(ptr, ptr)" },
    RuntimeDecl { name: "tml_str_eq", signature: "declare i1 @tml_str_eq(ptr, ptr)" },
    RuntimeDecl { name: "tml_str_len", signature: "declare i64 @tml_str_len(ptr)" },
    RuntimeDecl { name: "tml_str_from_int", signature: "declare ptr @tml_str_from_int(i64, i1)" },
    RuntimeDecl { name: "tml_str_from_float", signature: "declare ptr @tml_str_from_float(double)" },
    RuntimeDecl { name: "tml_str_free", signature: "declare void @tml_str_free(ptr)" },
];

const COLLECTIONS: &[RuntimeDecl] = &[
    RuntimeDecl { name: "tml_list_new", signature: "declare ptr @tml_list_new(i64)" },
    RuntimeDecl { name: "tml_list_push", signature: "declare void @tml_list_push(ptr, ptr)" },
    RuntimeDecl { name: "tml_list_get", signature: "declare ptr @tml_list_get(ptr, i64)" },
    RuntimeDecl { name: "tml_list_len", signature: "declare i64 @tml_list_len(ptr)" },
    RuntimeDecl { name: "tml_hashmap_new", signature: "declare ptr @tml_hashmap_new()" },
    RuntimeDecl { name: "tml_hashmap_insert", signature: "declare void @tml_hashmap_insert(ptr, ptr, ptr)" },
    RuntimeDecl { name: "tml_hashmap_get", signature: "declare ptr @tml_hashmap_get(ptr, ptr)" },
    RuntimeDecl { name: "tml_buffer_new", signature: "declare ptr @tml_buffer_new(i64)" },
    RuntimeDecl { name: "tml_buffer_append", signature: "declare void @tml_buffer_append(ptr, ptr, i64)" },
    RuntimeDecl { name: "tml_text_new", signature: "declare ptr @tml_text_new()" },
    RuntimeDecl { name: "tml_text_push", signature: "declare void @tml_text_push(ptr, ptr)" },
];

const PANIC: &[RuntimeDecl] = &[
    RuntimeDecl { name: "tml_panic", signature: "declare void @tml_panic(ptr)" },
    RuntimeDecl { name: "tml_panic_message_contains", signature: "declare i1 @tml_panic_message_contains(ptr, ptr)" },
    RuntimeDecl { name: "tml_enable_backtrace_on_panic", signature: "declare void @tml_enable_backtrace_on_panic()" },
    RuntimeDecl { name: "tml_run_should_panic", signature: "declare i1 @tml_run_should_panic(ptr, ptr)" },
];

const COVERAGE: &[RuntimeDecl] = &[
    RuntimeDecl { name: "tml_cover_func", signature: "declare void @tml_cover_func(i64)" },
    RuntimeDecl { name: "tml_coverage_write_file", signature: "declare void @tml_coverage_write_file(ptr)" },
];

const TIME: &[RuntimeDecl] = &[
    RuntimeDecl { name: "time_us", signature: "declare i64 @time_us()" },
    RuntimeDecl { name: "time_ns", signature: "declare i64 @time_ns()" },
];

const CONCURRENCY: &[RuntimeDecl] = &[
    RuntimeDecl { name: "tml_thread_spawn", signature: "declare ptr @tml_thread_spawn(ptr, ptr)" },
    RuntimeDecl { name: "tml_thread_join", signature: "declare ptr @tml_thread_join(ptr)" },
    RuntimeDecl { name: "tml_mutex_new", signature: "declare ptr @tml_mutex_new()" },
    RuntimeDecl { name: "tml_mutex_lock", signature: "declare void @tml_mutex_lock(ptr)" },
    RuntimeDecl { name: "tml_mutex_unlock", signature: "declare void @tml_mutex_unlock(ptr)" },
    RuntimeDecl { name: "tml_channel_new", signature: "declare ptr @tml_channel_new()" },
    RuntimeDecl { name: "tml_channel_send", signature: "declare void @tml_channel_send(ptr, ptr)" },
    RuntimeDecl { name: "tml_channel_recv", signature: "declare ptr @tml_channel_recv(ptr)" },
];

const CSTDLIB: &[RuntimeDecl] = &[
    RuntimeDecl { name: "printf", signature: "declare i32 @printf(ptr, ...)" },
    RuntimeDecl { name: "getenv", signature: "declare ptr @getenv(ptr)" },
    RuntimeDecl { name: "exit", signature: "declare void @exit(i32)" },
];

const LLVM_INTRINSICS: &[RuntimeDecl] = &[
    RuntimeDecl {
        name: "llvm.lifetime.start.p0",
        signature: "declare void @llvm.lifetime.start.p0(i64, ptr nocapture)",
    },
    RuntimeDecl {
        name: "llvm.lifetime.end.p0",
        signature: "declare void @llvm.lifetime.end.p0(i64, ptr nocapture)",
    },
    RuntimeDecl {
        name: "llvm.instrprof.increment",
        signature: "declare void @llvm.instrprof.increment(ptr, i64, i32, i32)",
    },
];

fn all_categories() -> Vec<&'static [RuntimeDecl]> {
    vec![MEMORY, STRING, COLLECTIONS, PANIC, COVERAGE, TIME, CONCURRENCY, CSTDLIB, LLVM_INTRINSICS]
}

/// Renders `declare` lines for exactly the symbols named in `used`, each on
/// its own line, categories in the fixed order above so output is
/// deterministic across runs.
pub fn declare_used(used: &HashSet<String>) -> String {
    let mut out = String::new();
    for category in all_categories() {
        for decl in category {
            if used.contains(decl.name) {
                out.push_str(decl.signature);
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_only_requested_symbols() {
        let mut used = HashSet::new();
        used.insert("tml_panic".to_string());
        let text = declare_used(&used);
        assert!(text.contains("declare void @tml_panic(ptr)"));
        assert!(!text.contains("tml_alloc"));
    }

    #[test]
    fn empty_request_yields_empty_text() {
        assert_eq!(declare_used(&HashSet::new()), "");
    }
}
