//! Code reflection: binding and layout summary of the reachable
//! declarations, for engine-side pipeline setup.

use crate::ast::{Flags, Program, Stmt};
use crate::options::ShaderTarget;
use crate::visitor::Visitor;
use std::fmt::Write;
use std::ops::ControlFlow;

/// A named binding point with an optional explicit location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSlot {
    pub ident: String,
    pub location: Option<u32>,
}

/// A constant buffer binding with its member names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantBufferReflection {
    pub ident: String,
    pub location: Option<u32>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReflectionData {
    /// Macros that were ever defined during preprocessing.
    pub macros: Vec<String>,
    pub textures: Vec<BindingSlot>,
    pub constant_buffers: Vec<ConstantBufferReflection>,
    pub samplers: Vec<BindingSlot>,
    pub input_attributes: Vec<BindingSlot>,
    pub output_attributes: Vec<BindingSlot>,
    pub fragment_targets: Vec<BindingSlot>,
    pub num_threads: [u32; 3],
}

pub struct ReflectionAnalyzer<'d> {
    data: &'d mut ReflectionData,
    target: ShaderTarget,
    auto_binding: bool,
    next_binding: u32,
}

impl<'d> ReflectionAnalyzer<'d> {
    pub fn new(data: &'d mut ReflectionData, target: ShaderTarget, auto_binding: bool) -> Self {
        ReflectionAnalyzer {
            data,
            target,
            auto_binding,
            next_binding: 0,
        }
    }

    pub fn reflect(mut self, program: &Program) {
        let _ = self.visit_program(program);

        for io in &program.entry_io.inputs {
            self.data.input_attributes.push(BindingSlot {
                ident: io.semantic.to_string(),
                location: None,
            });
        }
        for io in &program.entry_io.outputs {
            let slot = BindingSlot {
                ident: io.semantic.to_string(),
                location: Some(io.semantic.index),
            };
            if self.target == ShaderTarget::FragmentShader {
                self.data.fragment_targets.push(slot.clone());
            }
            self.data.output_attributes.push(slot);
        }
        if self.target == ShaderTarget::ComputeShader {
            self.data.num_threads = program.compute_layout.num_threads;
        }

        sort_slots(&mut self.data.textures);
        sort_slots(&mut self.data.samplers);
        sort_slots(&mut self.data.fragment_targets);
        self.data
            .constant_buffers
            .sort_by_key(|cb| (cb.location.unwrap_or(u32::MAX), cb.ident.clone()));
    }

    fn location(&mut self, explicit: Option<u32>) -> Option<u32> {
        match explicit {
            Some(slot) => Some(slot),
            None if self.auto_binding => {
                let slot = self.next_binding;
                self.next_binding += 1;
                Some(slot)
            }
            None => None,
        }
    }
}

fn sort_slots(slots: &mut [BindingSlot]) {
    slots.sort_by_key(|slot| (slot.location.unwrap_or(u32::MAX), slot.ident.clone()));
}

impl Visitor for ReflectionAnalyzer<'_> {
    type Break = ();

    fn visit_stmt(&mut self, stmt: &Stmt) -> ControlFlow<()> {
        match stmt {
            Stmt::UniformBufferDecl(decl) => {
                if decl.flags.contains(Flags::REACHABLE) {
                    let explicit = decl
                        .registers
                        .iter()
                        .find(|r| r.slot_kind == 'b')
                        .map(|r| r.slot);
                    let location = self.location(explicit);
                    let members = decl
                        .members
                        .iter()
                        .flat_map(|m| &m.var_decls)
                        .map(|v| v.ident.original.clone())
                        .collect();
                    self.data.constant_buffers.push(ConstantBufferReflection {
                        ident: decl.ident.original.clone(),
                        location,
                        members,
                    });
                }
                ControlFlow::Continue(())
            }
            Stmt::BufferDecls(buffer_stmt) => {
                for decl in &buffer_stmt.buffer_decls {
                    if !decl.flags.contains(Flags::REACHABLE) {
                        continue;
                    }
                    let explicit = decl
                        .registers
                        .iter()
                        .find(|r| r.slot_kind == 't')
                        .map(|r| r.slot);
                    let location = self.location(explicit);
                    if buffer_stmt.kind.is_texture() {
                        self.data.textures.push(BindingSlot {
                            ident: decl.ident.original.clone(),
                            location,
                        });
                    }
                }
                ControlFlow::Continue(())
            }
            Stmt::SamplerDecls(sampler_stmt) => {
                for decl in &sampler_stmt.sampler_decls {
                    if !decl.flags.contains(Flags::REACHABLE) {
                        continue;
                    }
                    let explicit = decl
                        .registers
                        .iter()
                        .find(|r| r.slot_kind == 's')
                        .map(|r| r.slot);
                    let location = self.location(explicit);
                    self.data.samplers.push(BindingSlot {
                        ident: decl.ident.original.clone(),
                        location,
                    });
                }
                ControlFlow::Continue(())
            }
            _ => ControlFlow::Continue(()),
        }
    }
}

/// Human readable reflection summary.
pub fn print_reflection(data: &ReflectionData) -> String {
    let mut out = String::new();
    let write_slots = |out: &mut String, title: &str, slots: &[BindingSlot]| {
        if slots.is_empty() {
            return;
        }
        let _ = writeln!(out, "{}:", title);
        for slot in slots {
            match slot.location {
                Some(location) => {
                    let _ = writeln!(out, "  {} (location {})", slot.ident, location);
                }
                None => {
                    let _ = writeln!(out, "  {}", slot.ident);
                }
            }
        }
    };
    if !data.macros.is_empty() {
        let _ = writeln!(out, "macros:");
        for name in &data.macros {
            let _ = writeln!(out, "  {}", name);
        }
    }
    if !data.constant_buffers.is_empty() {
        let _ = writeln!(out, "constant buffers:");
        for cb in &data.constant_buffers {
            match cb.location {
                Some(location) => {
                    let _ = writeln!(out, "  {} (binding {})", cb.ident, location);
                }
                None => {
                    let _ = writeln!(out, "  {}", cb.ident);
                }
            }
            for member in &cb.members {
                let _ = writeln!(out, "    {}", member);
            }
        }
    }
    write_slots(&mut out, "textures", &data.textures);
    write_slots(&mut out, "samplers", &data.samplers);
    write_slots(&mut out, "input attributes", &data.input_attributes);
    write_slots(&mut out, "output attributes", &data.output_attributes);
    write_slots(&mut out, "fragment targets", &data.fragment_targets);
    if data.num_threads != [1, 1, 1] && data.num_threads != [0, 0, 0] {
        let _ = writeln!(
            out,
            "thread group size: {} x {} x {}",
            data.num_threads[0], data.num_threads[1], data.num_threads[2]
        );
    }
    out
}
