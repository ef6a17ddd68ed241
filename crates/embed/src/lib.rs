//! C-ABI embedding façade. Mirrors
//! `examples/original_source/include/joy/joy.h` function-for-function
//! over `joy_runtime::embed_core::Interpreter`; every export here does
//! nothing but convert between C types and that safe Rust layer.
//!
//! `enable_autoput`/`enable_echo`/`joy_set_autoput`/`joy_set_echo` carry
//! the enumerated mode values (`spec.md` §6: autoput 0/1/2, echo
//! 0/1/2/3), not booleans, despite the C header's `enable_`/`enabled`
//! naming.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr;
use std::sync::OnceLock;

use tracing::{debug, trace};

use joy_core::{JoyConfig as CoreConfig, JoyErrorKind, JoyIo};
use joy_runtime::Interpreter;

/// Mirrors `JoyResult` in `joy.h`. Values come from
/// `joy_core::error::JoyErrorKind`'s own stable `#[repr(u32)]`; the two
/// enums are kept in lockstep by [`From<JoyErrorKind>`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoyResult {
    Ok = 0,
    ErrorSyntax = 1,
    ErrorRuntime = 2,
    ErrorType = 3,
    ErrorStackUnderflow = 4,
    ErrorOutOfMemory = 5,
    ErrorIo = 6,
    ErrorQuit = 7,
    ErrorAbort = 8,
}

impl From<JoyErrorKind> for JoyResult {
    fn from(kind: JoyErrorKind) -> Self {
        match kind {
            JoyErrorKind::Ok => JoyResult::Ok,
            JoyErrorKind::Syntax => JoyResult::ErrorSyntax,
            JoyErrorKind::Runtime => JoyResult::ErrorRuntime,
            JoyErrorKind::Type => JoyResult::ErrorType,
            JoyErrorKind::StackUnderflow => JoyResult::ErrorStackUnderflow,
            JoyErrorKind::OutOfMemory => JoyResult::ErrorOutOfMemory,
            JoyErrorKind::Io => JoyResult::ErrorIo,
            JoyErrorKind::Quit => JoyResult::ErrorQuit,
            JoyErrorKind::Abort => JoyResult::ErrorAbort,
        }
    }
}

/// Mirrors `JoyIO` in `joy.h`. All four callbacks are optional.
#[repr(C)]
pub struct JoyIoVtable {
    pub user_data: *mut c_void,
    pub read_char: Option<extern "C" fn(*mut c_void) -> c_int>,
    pub write_char: Option<extern "C" fn(*mut c_void, c_int)>,
    pub write_string: Option<extern "C" fn(*mut c_void, *const c_char)>,
    pub on_error: Option<extern "C" fn(*mut c_void, JoyResult, *const c_char, *const c_char, c_int, c_int)>,
}

/// Mirrors `JoyConfig` in `joy.h`.
#[repr(C)]
pub struct JoyConfig {
    pub initial_memory_size: usize,
    pub max_memory_size: usize,
    pub enable_gc_trace: c_int,
    pub enable_autoput: c_int,
    pub enable_echo: c_int,
    pub io: *mut JoyIoVtable,
}

/// Adapts the C callback quartet to [`joy_core::JoyIo`].
struct CallbackIo {
    user_data: *mut c_void,
    read_char: Option<extern "C" fn(*mut c_void) -> c_int>,
    write_char: Option<extern "C" fn(*mut c_void, c_int)>,
    write_string: Option<extern "C" fn(*mut c_void, *const c_char)>,
    on_error: Option<extern "C" fn(*mut c_void, JoyResult, *const c_char, *const c_char, c_int, c_int)>,
}

// Safety: the embedder owns `user_data` and is responsible for it being
// safe to dereference from whatever thread calls into this context.
// Parallel task children never carry this adapter (their I/O vtable is
// always the null one, `spec.md` §5), so it is never moved across
// threads by the runtime itself.
unsafe impl Send for CallbackIo {}

impl JoyIo for CallbackIo {
    fn read_char(&mut self) -> Option<u8> {
        let f = self.read_char?;
        let c = f(self.user_data);
        if c < 0 {
            None
        } else {
            Some(c as u8)
        }
    }

    fn write_char(&mut self, c: u8) {
        if let Some(f) = self.write_char {
            f(self.user_data, c_int::from(c));
        }
    }

    fn write_string(&mut self, s: &str) {
        if let (Some(f), Ok(cstring)) = (self.write_string, CString::new(s)) {
            f(self.user_data, cstring.as_ptr());
        }
    }

    fn on_error(&mut self, kind: JoyErrorKind, message: &str, line: u32, column: u32) {
        let Some(f) = self.on_error else { return };
        let message = CString::new(message).unwrap_or_default();
        // No per-error filename is tracked in `joy_core::Context`; the
        // callback still receives a (empty) C string so its signature
        // matches the header exactly.
        let file = CString::new("").unwrap();
        f(self.user_data, kind.into(), message.as_ptr(), file.as_ptr(), line as c_int, column as c_int);
    }
}

/// Opaque interpreter handle (`JoyContext` in `joy.h`).
pub struct JoyContext {
    interp: Interpreter,
    // Backing storage for the last pointer returned by
    // `joy_error_message`, kept alive until the next call.
    last_error_cstring: Option<CString>,
}

unsafe fn config_from_raw(config: *const JoyConfig) -> CoreConfig {
    let Some(config) = (unsafe { config.as_ref() }) else {
        return CoreConfig::default();
    };
    let io: Option<Box<dyn JoyIo + Send>> = if config.io.is_null() {
        None
    } else {
        let vt = unsafe { &*config.io };
        Some(Box::new(CallbackIo {
            user_data: vt.user_data,
            read_char: vt.read_char,
            write_char: vt.write_char,
            write_string: vt.write_string,
            on_error: vt.on_error,
        }))
    };
    let default = CoreConfig::default();
    CoreConfig {
        initial_memory_size: if config.initial_memory_size == 0 {
            default.initial_memory_size
        } else {
            config.initial_memory_size
        },
        max_memory_size: config.max_memory_size,
        enable_gc_trace: config.enable_gc_trace != 0,
        autoput: config.enable_autoput as u8,
        echo: config.enable_echo as u8,
        undeferror: default.undeferror,
        io,
    }
}

/// Create a new interpreter context.
///
/// # Safety
/// `config`, if non-null, must point to a valid, initialized
/// `JoyConfig`, and any non-null callback pointers it names must be
/// valid for the lifetime of the returned context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_create(config: *const JoyConfig) -> *mut JoyContext {
    let core_config = unsafe { config_from_raw(config) };
    debug!(
        initial_memory_size = core_config.initial_memory_size,
        max_memory_size = core_config.max_memory_size,
        "joy_create"
    );
    let interp = Interpreter::new(core_config);
    Box::into_raw(Box::new(JoyContext {
        interp,
        last_error_cstring: None,
    }))
}

/// Destroy a context. Safe to call with a null pointer.
///
/// # Safety
/// `ctx`, if non-null, must have been returned by [`joy_create`] and not
/// already destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_destroy(ctx: *mut JoyContext) {
    if !ctx.is_null() {
        trace!("joy_destroy");
        unsafe {
            drop(Box::from_raw(ctx));
        }
    }
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
/// `source` must be a valid, non-null, NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_eval_string(ctx: *mut JoyContext, source: *const c_char) -> JoyResult {
    if ctx.is_null() || source.is_null() {
        return JoyResult::ErrorRuntime;
    }
    let ctx = unsafe { &mut *ctx };
    let source = match unsafe { CStr::from_ptr(source) }.to_str() {
        Ok(s) => s,
        Err(_) => return JoyResult::ErrorSyntax,
    };
    trace!(len = source.len(), "joy_eval_string");
    match ctx.interp.eval_string(source) {
        Ok(()) => JoyResult::Ok,
        Err(err) => {
            debug!(kind = ?err.kind, message = %err.message, "joy_eval_string failed");
            err.kind.into()
        }
    }
}

/// Adapts a C `FILE*` to `std::io::Read` via `fread`/`ferror`.
struct CFile(*mut libc::FILE);

impl std::io::Read for CFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = unsafe { libc::fread(buf.as_mut_ptr() as *mut c_void, 1, buf.len(), self.0) };
        if n == 0 && unsafe { libc::ferror(self.0) } != 0 {
            return Err(std::io::Error::other("fread failed"));
        }
        Ok(n)
    }
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
/// `fp` must be a valid, open, readable `FILE*`. `filename`, if
/// non-null, must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_eval_file(ctx: *mut JoyContext, fp: *mut libc::FILE, filename: *const c_char) -> JoyResult {
    if ctx.is_null() || fp.is_null() {
        return JoyResult::ErrorIo;
    }
    let ctx = unsafe { &mut *ctx };
    let name = if filename.is_null() {
        "<file>".to_string()
    } else {
        unsafe { CStr::from_ptr(filename) }.to_string_lossy().into_owned()
    };
    trace!(file = %name, "joy_eval_file");
    match ctx.interp.eval_file(CFile(fp), &name) {
        Ok(()) => JoyResult::Ok,
        Err(err) => {
            debug!(kind = ?err.kind, message = %err.message, "joy_eval_file failed");
            err.kind.into()
        }
    }
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
/// `lib_path`, if non-null, must be a valid NUL-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_load_stdlib(ctx: *mut JoyContext, lib_path: *const c_char) -> JoyResult {
    if ctx.is_null() {
        return JoyResult::ErrorRuntime;
    }
    let ctx = unsafe { &mut *ctx };
    let path = if lib_path.is_null() {
        "usrlib.joy".to_string()
    } else {
        unsafe { CStr::from_ptr(lib_path) }.to_string_lossy().into_owned()
    };
    match ctx.interp.load_stdlib(Path::new(&path)) {
        Ok(()) => JoyResult::Ok,
        Err(err) => err.kind.into(),
    }
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_stack_depth(ctx: *mut JoyContext) -> usize {
    if ctx.is_null() {
        return 0;
    }
    unsafe { &*ctx }.interp.stack_depth()
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_stack_empty(ctx: *mut JoyContext) -> c_int {
    if ctx.is_null() {
        return 1;
    }
    c_int::from(unsafe { &*ctx }.interp.stack_empty())
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_stack_clear(ctx: *mut JoyContext) {
    if !ctx.is_null() {
        unsafe { &mut *ctx }.interp.stack_clear();
    }
}

/// Returns a pointer valid until the next call into this context.
///
/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_error_message(ctx: *mut JoyContext) -> *const c_char {
    if ctx.is_null() {
        return ptr::null();
    }
    let ctx = unsafe { &mut *ctx };
    match ctx.interp.last_error() {
        Some(err) => {
            let cstring = CString::new(err.message.as_ref()).unwrap_or_default();
            ctx.last_error_cstring = Some(cstring);
            ctx.last_error_cstring.as_ref().unwrap().as_ptr()
        }
        None => ptr::null(),
    }
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_error_line(ctx: *mut JoyContext) -> c_int {
    if ctx.is_null() {
        return 0;
    }
    unsafe { &*ctx }.interp.last_error().map(|e| e.line as c_int).unwrap_or(0)
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_error_column(ctx: *mut JoyContext) -> c_int {
    if ctx.is_null() {
        return 0;
    }
    unsafe { &*ctx }.interp.last_error().map(|e| e.column as c_int).unwrap_or(0)
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_set_autoput(ctx: *mut JoyContext, enabled: c_int) {
    if !ctx.is_null() {
        unsafe { &mut *ctx }.interp.set_autoput(enabled as u8);
    }
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_get_autoput(ctx: *mut JoyContext) -> c_int {
    if ctx.is_null() {
        return 0;
    }
    c_int::from(unsafe { &*ctx }.interp.autoput())
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_set_echo(ctx: *mut JoyContext, enabled: c_int) {
    if !ctx.is_null() {
        unsafe { &mut *ctx }.interp.set_echo(enabled as u8);
    }
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_get_echo(ctx: *mut JoyContext) -> c_int {
    if ctx.is_null() {
        return 0;
    }
    c_int::from(unsafe { &*ctx }.interp.echo())
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_memory_used(ctx: *mut JoyContext) -> usize {
    if ctx.is_null() {
        return 0;
    }
    unsafe { &*ctx }.interp.memory_stats().nodes_live
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_memory_max(ctx: *mut JoyContext) -> usize {
    if ctx.is_null() {
        return 0;
    }
    unsafe { &*ctx }.interp.memory_stats().nodes_max
}

/// # Safety
/// `ctx` must be a valid, non-null pointer returned by [`joy_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn joy_gc_count(ctx: *mut JoyContext) -> usize {
    if ctx.is_null() {
        return 0;
    }
    unsafe { &*ctx }.interp.memory_stats().collections as usize
}

#[unsafe(no_mangle)]
pub extern "C" fn joy_result_string(result: JoyResult) -> *const c_char {
    let s: &CStr = match result {
        JoyResult::Ok => c"OK",
        JoyResult::ErrorSyntax => c"SYNTAX",
        JoyResult::ErrorRuntime => c"RUNTIME",
        JoyResult::ErrorType => c"TYPE",
        JoyResult::ErrorStackUnderflow => c"STACK_UNDERFLOW",
        JoyResult::ErrorOutOfMemory => c"OUT_OF_MEMORY",
        JoyResult::ErrorIo => c"IO",
        JoyResult::ErrorQuit => c"QUIT",
        JoyResult::ErrorAbort => c"ABORT",
    };
    s.as_ptr()
}

static VERSION_STRING: OnceLock<CString> = OnceLock::new();

#[unsafe(no_mangle)]
pub extern "C" fn joy_version() -> *const c_char {
    VERSION_STRING
        .get_or_init(|| CString::new(format!("Joy {}", env!("CARGO_PKG_VERSION"))).unwrap())
        .as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_destroy_round_trip_with_default_config() {
        unsafe {
            let ctx = joy_create(ptr::null());
            assert!(!ctx.is_null());
            assert_eq!(joy_stack_depth(ctx), 0);
            assert_eq!(joy_stack_empty(ctx), 1);
            joy_destroy(ctx);
        }
    }

    #[test]
    fn eval_string_runs_and_reports_the_result_code() {
        unsafe {
            let config = JoyConfig {
                initial_memory_size: 0,
                max_memory_size: 0,
                enable_gc_trace: 0,
                enable_autoput: 0,
                enable_echo: 0,
                io: ptr::null_mut(),
            };
            let ctx = joy_create(&config);
            let source = CString::new("1 2 + .").unwrap();
            let result = joy_eval_string(ctx, source.as_ptr());
            assert_eq!(result, JoyResult::Ok);
            assert_eq!(joy_stack_depth(ctx), 1);
            joy_destroy(ctx);
        }
    }

    #[test]
    fn syntax_error_is_reported_with_a_message() {
        unsafe {
            let ctx = joy_create(ptr::null());
            let source = CString::new("@ .").unwrap();
            let result = joy_eval_string(ctx, source.as_ptr());
            assert_eq!(result, JoyResult::ErrorSyntax);
            let msg = joy_error_message(ctx);
            assert!(!msg.is_null());
            joy_destroy(ctx);
        }
    }

    #[test]
    fn result_string_and_version_are_non_null() {
        assert!(!joy_result_string(JoyResult::Ok).is_null());
        assert!(!joy_version().is_null());
    }
}
