//! Staged compiler data
//!
//! A [`CompilerData`] owns one contract's inputs and caches every phase of
//! the pipeline:
//!
//! ```text
//! source -> parsed -> folded -> global context -> (deploy IR, runtime IR)
//!        -> (deploy asm, runtime asm) -> (deploy bytecode, runtime bytecode)
//! ```
//!
//! Each phase is computed on first access, after its prerequisites, and is
//! never recomputed. Failures are cached the same way as successes.

pub mod assembly;
pub mod bytecode;
pub mod codegen;
pub mod context;
pub mod folding;
pub mod ir;
pub mod optimizer;

use crate::error::{CompileResult, CompilerWarning};
use crate::interfaces::InterfaceCodes;
use crate::settings::CompilerSettings;
use assembly::AsmItem;
use context::GlobalContext;
use ir::IrNode;
use ratel_parser::Module;
use std::sync::OnceLock;

/// The phase functions behind a [`CompilerData`]
pub trait PhaseBackend: Send + Sync {
    fn parse(&self, source: &str, source_id: u32) -> CompileResult<Module>;

    fn fold(&self, module: &Module) -> CompileResult<Module>;

    fn contextualize(
        &self,
        module: &Module,
        interface_codes: &InterfaceCodes,
    ) -> CompileResult<GlobalContext>;

    /// Deployment and runtime IR, produced together
    fn generate_ir(
        &self,
        ctx: &GlobalContext,
        settings: &CompilerSettings,
    ) -> CompileResult<(IrNode, IrNode)>;

    fn optimize(&self, ir: &IrNode) -> IrNode;

    fn assemble(&self, ir: &IrNode, settings: &CompilerSettings) -> CompileResult<Vec<AsmItem>>;

    fn emit(&self, assembly: &[AsmItem]) -> CompileResult<Vec<u8>>;
}

/// The reference implementation of every phase
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardBackend;

pub(crate) static STANDARD_BACKEND: StandardBackend = StandardBackend;

impl PhaseBackend for StandardBackend {
    #[tracing::instrument(level = "debug", skip(self, source))]
    fn parse(&self, source: &str, source_id: u32) -> CompileResult<Module> {
        let module = ratel_parser::parse_to_ast(source, source_id)?;
        tracing::debug!(statements = module.body.len(), "parsed");
        Ok(module)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn fold(&self, module: &Module) -> CompileResult<Module> {
        folding::fold_module(module)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn contextualize(
        &self,
        module: &Module,
        interface_codes: &InterfaceCodes,
    ) -> CompileResult<GlobalContext> {
        let ctx = context::build_global_context(module, interface_codes)?;
        tracing::debug!(
            functions = ctx.functions.len(),
            storage = ctx.storage.len(),
            "contextualized"
        );
        Ok(ctx)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn generate_ir(
        &self,
        ctx: &GlobalContext,
        settings: &CompilerSettings,
    ) -> CompileResult<(IrNode, IrNode)> {
        codegen::generate_ir(ctx, settings)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn optimize(&self, ir: &IrNode) -> IrNode {
        optimizer::optimize(ir)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(evm_version = %settings.evm_version))]
    fn assemble(&self, ir: &IrNode, settings: &CompilerSettings) -> CompileResult<Vec<AsmItem>> {
        assembly::assemble(ir, settings)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn emit(&self, assembly: &[AsmItem]) -> CompileResult<Vec<u8>> {
        let code = bytecode::emit(assembly)?;
        tracing::debug!(bytes = code.len(), "emitted");
        Ok(code)
    }
}

/// Observable state of one memoized phase
#[derive(Debug)]
pub enum PhaseState<'m, T> {
    Uncomputed,
    Computed(&'m CompileResult<T>),
}

/// Single-assignment cell for a phase result
#[derive(Debug)]
pub struct Memo<T> {
    cell: OnceLock<CompileResult<T>>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }
}

impl<T> Memo<T> {
    /// Cached result, running `compute` only if nothing is cached yet.
    /// Concurrent callers block until the first computation finishes.
    pub fn get_or_compute(
        &self,
        compute: impl FnOnce() -> CompileResult<T>,
    ) -> CompileResult<&T> {
        self.cell.get_or_init(compute).as_ref().map_err(Clone::clone)
    }

    pub fn state(&self) -> PhaseState<'_, T> {
        match self.cell.get() {
            Some(result) => PhaseState::Computed(result),
            None => PhaseState::Uncomputed,
        }
    }

    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Pipeline phases in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Parsed,
    Folded,
    Contextualized,
    Ir,
    DeployIr,
    RuntimeIr,
    DeployAsm,
    RuntimeAsm,
    DeployBytecode,
    RuntimeBytecode,
}

/// Memoized pipeline state for one contract
pub struct CompilerData<'b> {
    contract_name: String,
    source_code: String,
    interface_codes: InterfaceCodes,
    source_id: u32,
    settings: CompilerSettings,
    backend: &'b dyn PhaseBackend,

    vyper_module: Memo<Module>,
    vyper_module_folded: Memo<Module>,
    global_ctx: Memo<GlobalContext>,
    ir_pair: Memo<(IrNode, IrNode)>,
    ir_nodes: Memo<IrNode>,
    ir_runtime: Memo<IrNode>,
    assembly: Memo<Vec<AsmItem>>,
    assembly_runtime: Memo<Vec<AsmItem>>,
    bytecode: Memo<Vec<u8>>,
    bytecode_runtime: Memo<Vec<u8>>,
}

impl CompilerData<'static> {
    pub fn new(contract_name: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self::with_backend(contract_name, source_code, &STANDARD_BACKEND)
    }
}

impl<'b> CompilerData<'b> {
    pub fn with_backend(
        contract_name: impl Into<String>,
        source_code: impl Into<String>,
        backend: &'b dyn PhaseBackend,
    ) -> Self {
        Self {
            contract_name: contract_name.into(),
            source_code: source_code.into(),
            interface_codes: InterfaceCodes::new(),
            source_id: 0,
            settings: CompilerSettings::default(),
            backend,
            vyper_module: Memo::default(),
            vyper_module_folded: Memo::default(),
            global_ctx: Memo::default(),
            ir_pair: Memo::default(),
            ir_nodes: Memo::default(),
            ir_runtime: Memo::default(),
            assembly: Memo::default(),
            assembly_runtime: Memo::default(),
            bytecode: Memo::default(),
            bytecode_runtime: Memo::default(),
        }
    }

    /// Interfaces importable by the contract; `None` means no interfaces
    pub fn with_interface_codes(mut self, interface_codes: Option<InterfaceCodes>) -> Self {
        self.interface_codes = interface_codes.unwrap_or_default();
        self
    }

    pub fn with_source_id(mut self, source_id: u32) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn with_settings(mut self, settings: CompilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub fn interface_codes(&self) -> &InterfaceCodes {
        &self.interface_codes
    }

    pub fn source_id(&self) -> u32 {
        self.source_id
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn vyper_module(&self) -> CompileResult<&Module> {
        self.vyper_module
            .get_or_compute(|| self.backend.parse(&self.source_code, self.source_id))
    }

    pub fn vyper_module_folded(&self) -> CompileResult<&Module> {
        self.vyper_module_folded
            .get_or_compute(|| self.backend.fold(self.vyper_module()?))
    }

    pub fn global_ctx(&self) -> CompileResult<&GlobalContext> {
        self.global_ctx.get_or_compute(|| {
            self.backend
                .contextualize(self.vyper_module_folded()?, &self.interface_codes)
        })
    }

    fn ir_pair(&self) -> CompileResult<&(IrNode, IrNode)> {
        self.ir_pair
            .get_or_compute(|| self.backend.generate_ir(self.global_ctx()?, &self.settings))
    }

    fn finish_ir(&self, ir: &IrNode) -> IrNode {
        if self.settings.optimize {
            self.backend.optimize(ir)
        } else {
            ir.clone()
        }
    }

    /// Deployment IR
    pub fn ir_nodes(&self) -> CompileResult<&IrNode> {
        self.ir_nodes
            .get_or_compute(|| Ok(self.finish_ir(&self.ir_pair()?.0)))
    }

    pub fn ir_runtime(&self) -> CompileResult<&IrNode> {
        self.ir_runtime
            .get_or_compute(|| Ok(self.finish_ir(&self.ir_pair()?.1)))
    }

    pub fn assembly(&self) -> CompileResult<&[AsmItem]> {
        self.assembly
            .get_or_compute(|| self.backend.assemble(self.ir_nodes()?, &self.settings))
            .map(Vec::as_slice)
    }

    pub fn assembly_runtime(&self) -> CompileResult<&[AsmItem]> {
        self.assembly_runtime
            .get_or_compute(|| self.backend.assemble(self.ir_runtime()?, &self.settings))
            .map(Vec::as_slice)
    }

    pub fn bytecode(&self) -> CompileResult<&[u8]> {
        self.bytecode
            .get_or_compute(|| self.backend.emit(self.assembly()?))
            .map(Vec::as_slice)
    }

    pub fn bytecode_runtime(&self) -> CompileResult<&[u8]> {
        self.bytecode_runtime
            .get_or_compute(|| self.backend.emit(self.assembly_runtime()?))
            .map(Vec::as_slice)
    }

    pub fn is_computed(&self, phase: Phase) -> bool {
        match phase {
            Phase::Parsed => self.vyper_module.is_computed(),
            Phase::Folded => self.vyper_module_folded.is_computed(),
            Phase::Contextualized => self.global_ctx.is_computed(),
            Phase::Ir => self.ir_pair.is_computed(),
            Phase::DeployIr => self.ir_nodes.is_computed(),
            Phase::RuntimeIr => self.ir_runtime.is_computed(),
            Phase::DeployAsm => self.assembly.is_computed(),
            Phase::RuntimeAsm => self.assembly_runtime.is_computed(),
            Phase::DeployBytecode => self.bytecode.is_computed(),
            Phase::RuntimeBytecode => self.bytecode_runtime.is_computed(),
        }
    }

    /// Diagnostics from the phases computed so far. The deployment assembly
    /// embeds the runtime, so it is consulted first.
    pub fn warnings(&self) -> Vec<CompilerWarning> {
        for memo in [&self.assembly, &self.assembly_runtime] {
            if let PhaseState::Computed(Ok(items)) = memo.state() {
                return assembly::debug_warnings(items);
            }
        }
        Vec::new()
    }
}

impl std::fmt::Debug for CompilerData<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerData")
            .field("contract_name", &self.contract_name)
            .field("source_id", &self.source_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
