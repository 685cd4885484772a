//! Purpose: C ABI bridge for native hosts (libsqlitekvs).
//! Exports: `kvs_*` open/close, typed get/set, delete, transaction, and run-sql functions.
//! Role: Stable ABI surface; the header lives in `include/sqlitekvs.h`.
//! Invariants: Keys are NUL-terminated UTF-16; text values are UTF-16 with byte lengths,
//! including text read through `kvs_try_get_bytes`.
//! Invariants: try-get returns 1 found, 0 absent, -code on error, and leaves the select
//! stepped; text/bytes pointers stay valid until `kvs_reset_select`, the next select, or
//! `kvs_close`.
//! Invariants: `kvs_has_key` returns only 1 or 0; any error reads as absent.
//! Invariants: Writes return the step code (`SQLITE_DONE` on success).
//! Invariants: Null handles, null out-pointers, and malformed UTF-16 yield `SQLITE_MISUSE`.
#![allow(non_camel_case_types)]

use crate::core::error::{Error, ErrorKind};
use crate::core::sql::RowControl;
use crate::core::store::Store;
use crate::core::value::{ValueKind, ValueView};
use rusqlite::ffi;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

const FOUND: c_int = 1;
const NOT_FOUND: c_int = 0;

pub type kvs_error_callback = Option<unsafe extern "C" fn(message: *const c_char)>;

pub type kvs_row_callback = Option<
    unsafe extern "C" fn(
        user_data: *mut c_void,
        column_count: c_int,
        values: *mut *mut c_char,
        names: *mut *mut c_char,
    ) -> c_int,
>;

/// Opaque to C callers; only ever handled through a pointer.
pub struct kvs_store {
    store: Store,
    out: OutBuffers,
}

/// Owned copies handed out by the try-get calls, cleared on `kvs_reset_select`.
#[derive(Default)]
struct OutBuffers {
    text: Vec<u16>,
    bytes: Vec<u8>,
}

impl OutBuffers {
    fn clear(&mut self) {
        self.text.clear();
        self.bytes.clear();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_open(path: *const u16, out_store: *mut *mut kvs_store) -> c_int {
    if out_store.is_null() {
        return ffi::SQLITE_MISUSE;
    }
    let path = match read_utf16_z(path, "path") {
        Ok(path) => path,
        Err(err) => return err.result_code(),
    };
    let store = match Store::open(&path) {
        Ok(store) => store,
        Err(err) => return err.result_code(),
    };
    let handle = Box::new(kvs_store {
        store,
        out: OutBuffers::default(),
    });
    unsafe {
        *out_store = Box::into_raw(handle);
    }
    ffi::SQLITE_OK
}

/// Finalizes cached statements and closes the connection. Null is a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn kvs_close(store: *mut kvs_store) -> c_int {
    if store.is_null() {
        return ffi::SQLITE_OK;
    }
    let handle = unsafe { Box::from_raw(store) };
    match handle.store.close() {
        Ok(()) => ffi::SQLITE_OK,
        Err(err) => err.result_code(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_try_get_int(
    store: *mut kvs_store,
    key: *const u16,
    out_value: *mut i64,
) -> c_int {
    if out_value.is_null() {
        return -ffi::SQLITE_MISUSE;
    }
    try_get_with(store, key, |view, _| {
        let value = view.int()?;
        unsafe {
            *out_value = value;
        }
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_try_get_double(
    store: *mut kvs_store,
    key: *const u16,
    out_value: *mut f64,
) -> c_int {
    if out_value.is_null() {
        return -ffi::SQLITE_MISUSE;
    }
    try_get_with(store, key, |view, _| {
        let value = view.double()?;
        unsafe {
            *out_value = value;
        }
        Ok(())
    })
}

/// `out_length` receives the text length in bytes, excluding any terminator.
#[unsafe(no_mangle)]
pub extern "C" fn kvs_try_get_text(
    store: *mut kvs_store,
    key: *const u16,
    out_text: *mut *const u16,
    out_length: *mut c_int,
) -> c_int {
    if out_text.is_null() || out_length.is_null() {
        return -ffi::SQLITE_MISUSE;
    }
    try_get_with(store, key, |view, out| {
        let text = view.text()?;
        out.text.clear();
        out.text.extend(text.encode_utf16());
        let length = byte_length(out.text.len() * 2)?;
        unsafe {
            *out_text = out.text.as_ptr();
            *out_length = length;
        }
        Ok(())
    })
}

/// Text values come back as native-endian UTF-16, the same units `kvs_try_get_text`
/// returns; blobs come back unchanged.
#[unsafe(no_mangle)]
pub extern "C" fn kvs_try_get_bytes(
    store: *mut kvs_store,
    key: *const u16,
    out_bytes: *mut *const u8,
    out_length: *mut c_int,
) -> c_int {
    if out_bytes.is_null() || out_length.is_null() {
        return -ffi::SQLITE_MISUSE;
    }
    try_get_with(store, key, |view, out| {
        let bytes = match view.kind() {
            ValueKind::Text => {
                out.bytes.clear();
                out.bytes
                    .extend(view.text()?.encode_utf16().flat_map(u16::to_ne_bytes));
                out.bytes.as_slice()
            }
            _ => view.bytes()?,
        };
        let length = byte_length(bytes.len())?;
        unsafe {
            *out_bytes = bytes.as_ptr();
            *out_length = length;
        }
        Ok(())
    })
}

/// Returns 1 when the key exists and 0 otherwise. Like the try-get calls it leaves the
/// select stepped until `kvs_reset_select`.
#[unsafe(no_mangle)]
pub extern "C" fn kvs_has_key(store: *mut kvs_store, key: *const u16) -> c_int {
    match try_get_with(store, key, |_, _| Ok(())) {
        FOUND => FOUND,
        _ => NOT_FOUND,
    }
}

/// Releases the row held by the select statement and invalidates returned pointers.
#[unsafe(no_mangle)]
pub extern "C" fn kvs_reset_select(store: *mut kvs_store) {
    if let Ok(handle) = borrow_store(store) {
        handle.store.reset_select();
        handle.out.clear();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_set_int(store: *mut kvs_store, key: *const u16, value: i64) -> c_int {
    write_with(store, key, |store, key| store.set_int(key, value))
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_set_double(store: *mut kvs_store, key: *const u16, value: f64) -> c_int {
    write_with(store, key, |store, key| store.set_double(key, value))
}

/// `length` is in bytes; a negative length reads `value` up to its NUL terminator.
#[unsafe(no_mangle)]
pub extern "C" fn kvs_set_text(
    store: *mut kvs_store,
    key: *const u16,
    value: *const u16,
    length: i64,
) -> c_int {
    let text = match read_utf16_value(value, length) {
        Ok(text) => text,
        Err(err) => return err.result_code(),
    };
    write_with(store, key, |store, key| store.set_text(key, &text))
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_set_bytes(
    store: *mut kvs_store,
    key: *const u16,
    value: *const u8,
    length: i64,
) -> c_int {
    let bytes: &[u8] = match (value.is_null(), usize::try_from(length)) {
        (_, Err(_)) => return ffi::SQLITE_MISUSE,
        (true, Ok(0)) => &[],
        (true, Ok(_)) => return ffi::SQLITE_MISUSE,
        (false, Ok(length)) => unsafe { std::slice::from_raw_parts(value, length) },
    };
    write_with(store, key, |store, key| store.set_bytes(key, bytes))
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_delete_key(store: *mut kvs_store, key: *const u16) -> c_int {
    write_with(store, key, |store, key| store.delete_key(key).map(drop))
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_delete_all(store: *mut kvs_store) -> c_int {
    step_with(store, |store| store.delete_all().map(drop))
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_begin(store: *mut kvs_store) -> c_int {
    step_with(store, Store::begin)
}

#[unsafe(no_mangle)]
pub extern "C" fn kvs_commit(store: *mut kvs_store) -> c_int {
    step_with(store, Store::commit)
}

/// Runs `sql` uncached. `on_row` receives NUL-terminated UTF-8 values (NULL for SQL NULL)
/// and column names; a nonzero return aborts with `SQLITE_ABORT`. `on_error` receives the
/// engine's message, which is released after the callback returns.
#[unsafe(no_mangle)]
pub extern "C" fn kvs_run_sql(
    store: *mut kvs_store,
    sql: *const c_char,
    on_error: kvs_error_callback,
    on_row: kvs_row_callback,
    user_data: *mut c_void,
) -> c_int {
    let handle = match borrow_store(store) {
        Ok(handle) => handle,
        Err(code) => return code,
    };
    let result = read_c_str(sql, "sql").and_then(|sql| {
        handle.store.run_sql(sql, |row| {
            let Some(callback) = on_row else {
                return RowControl::Continue;
            };
            let values: Vec<Option<CString>> = row
                .values()
                .iter()
                .map(|value| value.as_deref().map(to_c_string))
                .collect();
            let names: Vec<CString> = row.columns().iter().map(|name| to_c_string(name)).collect();
            let mut value_ptrs: Vec<*mut c_char> = values
                .iter()
                .map(|value| {
                    value
                        .as_ref()
                        .map_or(ptr::null_mut(), |value| value.as_ptr().cast_mut())
                })
                .collect();
            let mut name_ptrs: Vec<*mut c_char> =
                names.iter().map(|name| name.as_ptr().cast_mut()).collect();
            let count = c_int::try_from(value_ptrs.len()).unwrap_or(c_int::MAX);
            let code = unsafe {
                callback(
                    user_data,
                    count,
                    value_ptrs.as_mut_ptr(),
                    name_ptrs.as_mut_ptr(),
                )
            };
            if code == 0 {
                RowControl::Continue
            } else {
                RowControl::Abort
            }
        })
    });
    match result {
        Ok(_) => ffi::SQLITE_OK,
        Err(err) => {
            if let Some(callback) = on_error {
                let message = to_c_string(err.message().unwrap_or("unknown error"));
                unsafe { callback(message.as_ptr()) };
            }
            err.result_code()
        }
    }
}

fn try_get_with<F>(store: *mut kvs_store, key: *const u16, read: F) -> c_int
where
    F: FnOnce(ValueView<'_>, &mut OutBuffers) -> Result<(), Error>,
{
    let handle = match borrow_store(store) {
        Ok(handle) => handle,
        Err(code) => return -code,
    };
    let key = match read_utf16_z(key, "key") {
        Ok(key) => key,
        Err(err) => return -err.result_code(),
    };
    match handle.store.select(&key) {
        Ok(Some(view)) => match read(view, &mut handle.out) {
            Ok(()) => FOUND,
            Err(err) => -err.result_code(),
        },
        Ok(None) => NOT_FOUND,
        Err(err) => -err.result_code(),
    }
}

fn write_with<F>(store: *mut kvs_store, key: *const u16, write: F) -> c_int
where
    F: FnOnce(&mut Store, &str) -> Result<(), Error>,
{
    let key = match read_utf16_z(key, "key") {
        Ok(key) => key,
        Err(err) => return err.result_code(),
    };
    step_with(store, |store| write(store, &key))
}

fn step_with<F>(store: *mut kvs_store, step: F) -> c_int
where
    F: FnOnce(&mut Store) -> Result<(), Error>,
{
    let handle = match borrow_store(store) {
        Ok(handle) => handle,
        Err(code) => return code,
    };
    match step(&mut handle.store) {
        Ok(()) => ffi::SQLITE_DONE,
        Err(err) => err.result_code(),
    }
}

fn borrow_store<'a>(store: *mut kvs_store) -> Result<&'a mut kvs_store, c_int> {
    if store.is_null() {
        return Err(ffi::SQLITE_MISUSE);
    }
    unsafe { Ok(&mut *store) }
}

fn read_utf16_z(input: *const u16, what: &str) -> Result<String, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::Misuse).with_message(format!("{what} is null")));
    }
    let mut len = 0;
    unsafe {
        while *input.add(len) != 0 {
            len += 1;
        }
    }
    let units = unsafe { std::slice::from_raw_parts(input, len) };
    decode_utf16(units, what)
}

fn read_utf16_value(input: *const u16, length: i64) -> Result<String, Error> {
    if length < 0 {
        return read_utf16_z(input, "value");
    }
    if length % 2 != 0 {
        return Err(Error::new(ErrorKind::Misuse)
            .with_message(format!("text length {length} is not a whole number of UTF-16 units")));
    }
    if input.is_null() {
        if length == 0 {
            return Ok(String::new());
        }
        return Err(Error::new(ErrorKind::Misuse).with_message("value is null"));
    }
    let units = unsafe { std::slice::from_raw_parts(input, host_length(length)? / 2) };
    decode_utf16(units, "value")
}

fn decode_utf16(units: &[u16], what: &str) -> Result<String, Error> {
    String::from_utf16(units).map_err(|err| {
        Error::new(ErrorKind::Misuse)
            .with_message(format!("{what} is not valid UTF-16"))
            .with_source(err)
    })
}

fn read_c_str<'a>(input: *const c_char, what: &str) -> Result<&'a str, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::Misuse).with_message(format!("{what} is null")));
    }
    unsafe { CStr::from_ptr(input) }.to_str().map_err(|err| {
        Error::new(ErrorKind::Misuse)
            .with_message(format!("{what} is not valid UTF-8"))
            .with_source(err)
    })
}

fn host_length(length: i64) -> Result<usize, Error> {
    usize::try_from(length).map_err(|_| {
        Error::new(ErrorKind::Engine)
            .with_engine_code(ffi::SQLITE_TOOBIG)
            .with_message(format!("length {length} does not fit in memory"))
    })
}

fn byte_length(len: usize) -> Result<c_int, Error> {
    c_int::try_from(len).map_err(|_| {
        Error::new(ErrorKind::Engine)
            .with_engine_code(ffi::SQLITE_TOOBIG)
            .with_message("value is too large for the C interface")
    })
}

// Interior NULs truncate, as they would for any C string.
fn to_c_string(input: &str) -> CString {
    let end = input.find('\0').unwrap_or(input.len());
    CString::new(&input[..end]).unwrap_or_default()
}
