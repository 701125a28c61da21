//! Binding table for the native transcoder entry points
//!
//! Resolves every [`NativeExport`] against an instantiated module, checks
//! the WASM signature against the declaration once, and hands out
//! [`NativeFn`] callables that marshal `u32` arguments across the boundary.
//!
//! # Key Types
//!
//! - [`BindingTable`] - Resolved callables, indexed by [`NativeFnId`]
//! - [`NativeFn`] - A single callable with fixed arity and return kind
//! - [`NativeValue`] - Decoded result of a call

pub mod exports;

use hashbrown::HashMap;
use wasmtime::{AsContextMut, Func, FuncType, Instance, Val, ValType};

use crate::error::{BindingError, Error, Result};

pub use exports::{NATIVE_EXPORTS, NativeExport, NativeFnId, ReturnKind, Sentinel};

/// Decoded result of a native call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeValue {
    Void,
    Bool(bool),
    Number(u32),
}

impl NativeValue {
    fn kind_name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
        }
    }
}

/// A resolved native entry point
#[derive(Debug, Clone)]
pub struct NativeFn {
    export: &'static NativeExport,
    /// The name actually found in the module (preferred name or an alias)
    resolved_name: &'static str,
    func: Func,
    params: Vec<ValType>,
}

impl NativeFn {
    pub fn export(&self) -> &'static NativeExport {
        self.export
    }

    pub fn resolved_name(&self) -> &'static str {
        self.resolved_name
    }

    /// Call with numeric arguments
    ///
    /// Arguments are reinterpreted as the declared parameter type, so
    /// `u32::MAX` reaches an `i32` parameter as `-1`.
    pub fn call(&self, mut store: impl AsContextMut, args: &[u32]) -> Result<NativeValue> {
        if args.len() != self.export.arity {
            return Err(BindingError::ArityMismatch {
                name: self.export.name,
                expected: self.export.arity,
                got: args.len(),
            }
            .into());
        }

        let params: Vec<Val> = args
            .iter()
            .zip(&self.params)
            .map(|(arg, ty)| match ty {
                ValType::I64 => Val::I64(i64::from(*arg)),
                ValType::F32 => Val::F32((*arg as f32).to_bits()),
                ValType::F64 => Val::F64(f64::from(*arg).to_bits()),
                _ => Val::I32(*arg as i32),
            })
            .collect();

        log::trace!("native call {}{:?}", self.resolved_name, args);

        let mut results = [Val::I32(0)];
        let results = &mut results[..self.export.returns.result_count()];
        self.func
            .call(&mut store, &params, results)
            .map_err(|e| Error::Trap {
                name: self.export.name,
                source: e.into(),
            })?;

        Ok(match self.export.returns {
            ReturnKind::Void => NativeValue::Void,
            ReturnKind::Bool => NativeValue::Bool(decode_number(&results[0]) != 0),
            ReturnKind::Number => NativeValue::Number(decode_number(&results[0])),
        })
    }

    pub fn call_bool(&self, store: impl AsContextMut, args: &[u32]) -> Result<bool> {
        match self.call(store, args)? {
            NativeValue::Bool(value) => Ok(value),
            other => Err(self.unexpected("bool", other)),
        }
    }

    pub fn call_number(&self, store: impl AsContextMut, args: &[u32]) -> Result<u32> {
        match self.call(store, args)? {
            NativeValue::Number(value) => Ok(value),
            other => Err(self.unexpected("number", other)),
        }
    }

    pub fn call_void(&self, store: impl AsContextMut, args: &[u32]) -> Result<()> {
        match self.call(store, args)? {
            NativeValue::Void => Ok(()),
            other => Err(self.unexpected("void", other)),
        }
    }

    fn unexpected(&self, expected: &'static str, found: NativeValue) -> Error {
        BindingError::UnexpectedReturn {
            name: self.export.name,
            expected,
            found: found.kind_name(),
        }
        .into()
    }
}

fn decode_number(val: &Val) -> u32 {
    match val {
        Val::I32(v) => *v as u32,
        Val::I64(v) => *v as u32,
        Val::F32(bits) => f32::from_bits(*bits) as u32,
        Val::F64(bits) => f64::from_bits(*bits) as u32,
        _ => 0,
    }
}

fn is_numeric(ty: &ValType) -> bool {
    matches!(ty, ValType::I32 | ValType::I64 | ValType::F32 | ValType::F64)
}

fn type_name(ty: &ValType) -> &'static str {
    match ty {
        ValType::I32 => "i32",
        ValType::I64 => "i64",
        ValType::F32 => "f32",
        ValType::F64 => "f64",
        ValType::V128 => "v128",
        _ => "ref",
    }
}

fn describe(params: &[ValType], results: &[ValType]) -> String {
    let params: Vec<&str> = params.iter().map(type_name).collect();
    let results: Vec<&str> = results.iter().map(type_name).collect();
    format!("({}) -> ({})", params.join(", "), results.join(", "))
}

/// Check a WASM function type against a declaration
pub fn check_signature(export: &'static NativeExport, ty: &FuncType) -> Result<(), BindingError> {
    let params: Vec<ValType> = ty.params().collect();
    let results: Vec<ValType> = ty.results().collect();

    let params_ok = params.len() == export.arity && params.iter().all(is_numeric);
    let results_ok =
        results.len() == export.returns.result_count() && results.iter().all(is_numeric);

    if params_ok && results_ok {
        return Ok(());
    }

    let expected_results = match export.returns {
        ReturnKind::Void => "()".to_string(),
        kind => format!("({})", kind.as_str()),
    };
    Err(BindingError::SignatureMismatch {
        name: export.name,
        expected: format!(
            "({}) -> {}",
            vec!["i32"; export.arity].join(", "),
            expected_results
        ),
        found: describe(&params, &results),
    })
}

/// Resolved native entry points of one module instance
///
/// Read-only after construction.
#[derive(Debug, Clone)]
pub struct BindingTable {
    functions: Vec<Option<NativeFn>>,
    by_name: HashMap<&'static str, NativeFnId>,
}

impl BindingTable {
    /// Resolve the whole prototype table against `instance`
    ///
    /// Fails on the first required export that is missing, and on any
    /// export whose signature disagrees with its declaration.
    pub fn new(mut store: impl AsContextMut, instance: &Instance) -> Result<Self, BindingError> {
        let mut functions = Vec::with_capacity(NATIVE_EXPORTS.len());
        let mut by_name = HashMap::with_capacity(NATIVE_EXPORTS.len());

        for id in NativeFnId::ALL {
            let export = id.export();
            let resolved = export.candidate_names().find_map(|name| {
                instance
                    .get_func(&mut store, name)
                    .map(|func| (name, func))
            });

            let Some((resolved_name, func)) = resolved else {
                if export.required {
                    return Err(BindingError::MissingExport { name: export.name });
                }
                log::debug!("optional native export '{}' not present", export.name);
                functions.push(None);
                continue;
            };

            let ty = func.ty(&store);
            check_signature(export, &ty)?;
            if resolved_name != export.name {
                log::debug!("bound '{}' through alias '{}'", export.name, resolved_name);
            }

            by_name.insert(export.name, id);
            functions.push(Some(NativeFn {
                export,
                resolved_name,
                func,
                params: ty.params().collect(),
            }));
        }

        Ok(Self { functions, by_name })
    }

    /// Get a callable by id
    pub fn get(&self, id: NativeFnId) -> Result<&NativeFn, BindingError> {
        self.functions
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or(BindingError::MissingExport { name: id.name() })
    }

    /// Look up a callable by its declared name
    pub fn by_name(&self, name: &str) -> Option<&NativeFn> {
        self.by_name.get(name).and_then(|id| self.get(*id).ok())
    }

    /// Returns true if the module exports this entry point
    pub fn contains(&self, id: NativeFnId) -> bool {
        self.get(id).is_ok()
    }

    /// Iterate over the bound callables in table order
    pub fn iter(&self) -> impl Iterator<Item = &NativeFn> {
        self.functions.iter().flatten()
    }

    pub fn call(&self, store: impl AsContextMut, id: NativeFnId, args: &[u32]) -> Result<NativeValue> {
        self.get(id)?.call(store, args)
    }

    pub fn call_bool(&self, store: impl AsContextMut, id: NativeFnId, args: &[u32]) -> Result<bool> {
        self.get(id)?.call_bool(store, args)
    }

    pub fn call_number(
        &self,
        store: impl AsContextMut,
        id: NativeFnId,
        args: &[u32],
    ) -> Result<u32> {
        self.get(id)?.call_number(store, args)
    }

    pub fn call_void(&self, store: impl AsContextMut, id: NativeFnId, args: &[u32]) -> Result<()> {
        self.get(id)?.call_void(store, args)
    }
}
