// ops.rs — Demonstration operator kinds
//
// Small arithmetic operators written purely against the engine API. Their
// arithmetic is naive Verilog text; what matters is how they describe timing:
// every operation accrues its estimated delay from the target before its
// operands are consumed, so the scheduler inserts pipeline boundaries and
// delay stages where the clock period demands them.
//
// Preconditions: widths and counts are at least 1 (checked by the CLI).
// Postconditions: each kind yields one finalized operator per distinct name.
// Failure modes: any GenerationError from the engine, typically
//                UnreachableTiming when the period is too short.
// Side effects: none beyond the generation context.

use crate::context::{GenerationContext, Schedulable};
use crate::diag::GenResult;
use crate::instance::PortMap;
use crate::operator::Operator;
use crate::signal::FpField;
use crate::target::Target;

/// Widest carry chain, in bits, whose adder (plus carry-in) fits one period.
fn chunk_width(target: &dyn Target, width: u32) -> u32 {
    if !target.is_pipelined() {
        return width;
    }
    let period = target.period_ns();
    let mut chunk = 1;
    while chunk < width && target.adder_delay(chunk + 2) <= period {
        chunk += 1;
    }
    chunk
}

fn ceil_log2(n: u32) -> u32 {
    if n <= 1 {
        0
    } else {
        32 - (n - 1).leading_zeros()
    }
}

// ── Integer adder ───────────────────────────────────────────────────────────

/// `R = X + Y` modulo 2^width, split into carry-linked chunks when one carry
/// chain does not fit the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntAdder {
    pub width: u32,
}

impl Schedulable for IntAdder {
    fn name(&self) -> String {
        format!("IntAdder_{}", self.width)
    }

    fn build(&self, op: &mut Operator, _ctx: &mut GenerationContext) -> GenResult<()> {
        let w = self.width;
        op.add_input("X", w)?;
        op.add_input("Y", w)?;

        let chunk = chunk_width(op.target(), w);
        if chunk >= w {
            let delay = op.target().adder_delay(w);
            op.accrue(delay)?;
            let x = op.consume("X")?;
            let y = op.consume("Y")?;
            return op.declare_output("R", w, format!("{} + {}", x, y));
        }

        let mut parts: Vec<(String, u32)> = Vec::new();
        let mut lo = 0;
        while lo < w {
            let size = chunk.min(w - lo);
            let hi = lo + size - 1;
            let delay = op.target().adder_delay(size + 1);
            op.accrue(delay)?;
            let x = op.consume("X")?;
            let y = op.consume("Y")?;
            let carry = match parts.last() {
                None => "1'b0".to_string(),
                Some((prev, prev_size)) => format!("{}[{}]", op.consume(prev)?, prev_size),
            };
            let name = format!("s{}", parts.len());
            op.declare(
                &name,
                size + 1,
                format!(
                    "{{1'b0, {x}[{hi}:{lo}]}} + {{1'b0, {y}[{hi}:{lo}]}} + {carry}",
                    x = x,
                    y = y,
                    hi = hi,
                    lo = lo,
                    carry = carry
                ),
            )?;
            parts.push((name, size));
            lo += size;
        }

        let mut pieces = Vec::with_capacity(parts.len());
        for (name, size) in parts.iter().rev() {
            pieces.push(format!("{}[{}:0]", op.consume(name)?, size - 1));
        }
        op.declare_output("R", w, format!("{{{}}}", pieces.join(", ")))
    }
}

// ── Multi-operand adder ─────────────────────────────────────────────────────

/// `R = X0 + X1 + ... + X(n-1)` modulo 2^width as a linear rake. Inputs all
/// arrive at cycle 0, so late operands ride delay chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiAdder {
    pub width: u32,
    pub count: u32,
}

impl Schedulable for MultiAdder {
    fn name(&self) -> String {
        format!("MultiAdder_{}x{}", self.count, self.width)
    }

    fn build(&self, op: &mut Operator, _ctx: &mut GenerationContext) -> GenResult<()> {
        let w = self.width;
        for i in 0..self.count {
            op.add_input(&format!("X{}", i), w)?;
        }
        let mut acc = "X0".to_string();
        for i in 1..self.count {
            let delay = op.target().adder_delay(w);
            op.accrue(delay)?;
            let a = op.consume(&acc)?;
            let x = op.consume(&format!("X{}", i))?;
            let name = format!("acc{}", i);
            op.declare(&name, w, format!("{} + {}", a, x))?;
            acc = name;
        }
        let r = op.consume(&acc)?;
        op.declare_output("R", w, r)
    }
}

// ── Integer multiplier ──────────────────────────────────────────────────────

/// `R = X * Y` (2*width bits) from LUT-sized partial products summed by a
/// rake of adders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntMultiplier {
    pub width: u32,
}

impl Schedulable for IntMultiplier {
    fn name(&self) -> String {
        format!("IntMultiplier_{}x{}", self.width, self.width)
    }

    fn build(&self, op: &mut Operator, _ctx: &mut GenerationContext) -> GenResult<()> {
        let w = self.width;
        op.add_input("X", w)?;
        op.add_input("Y", w)?;

        let chunk = (op.target().lut_inputs() / 2).max(1);
        let chunks = w.div_ceil(chunk);

        // Partial products are computed in parallel.
        let delay = op.target().local_wire_delay(chunks) + op.target().lut_delay();
        op.accrue(delay)?;
        let x = op.consume("X")?;
        let y = op.consume("Y")?;
        for j in 0..chunks {
            let lo = j * chunk;
            let size = chunk.min(w - lo);
            op.declare(
                &format!("pp{}", j),
                w + size,
                format!("{} * {}[{}:{}]", x, y, lo + size - 1, lo),
            )?;
        }

        let mut acc = "pp0".to_string();
        for j in 1..chunks {
            let delay = op.target().adder_delay(2 * w);
            op.accrue(delay)?;
            let a = op.consume(&acc)?;
            let p = op.consume(&format!("pp{}", j))?;
            let name = format!("sum{}", j);
            op.declare(&name, 2 * w, format!("{} + ({} << {})", a, p, j * chunk))?;
            acc = name;
        }
        let r = op.consume(&acc)?;
        op.declare_output("R", 2 * w, r)
    }
}

// ── Sum of products ─────────────────────────────────────────────────────────

/// `R = A0*B0 + ... + A(n-1)*B(n-1)` from `n` IntMultiplier instances and
/// an adder rake. Exercises composition: the rake starts once every product
/// is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumOfProducts {
    pub width: u32,
    pub count: u32,
}

impl SumOfProducts {
    pub fn output_width(&self) -> u32 {
        2 * self.width + ceil_log2(self.count)
    }
}

impl Schedulable for SumOfProducts {
    fn name(&self) -> String {
        format!("SumOfProducts_{}x{}", self.count, self.width)
    }

    fn build(&self, op: &mut Operator, ctx: &mut GenerationContext) -> GenResult<()> {
        let w = self.width;
        let mult = ctx.generate(&IntMultiplier { width: w })?;

        for i in 0..self.count {
            op.add_input(&format!("A{}", i), w)?;
            op.add_input(&format!("B{}", i), w)?;
        }
        for i in 0..self.count {
            let ports = PortMap::new()
                .input("X", &format!("A{}", i))
                .input("Y", &format!("B{}", i))
                .output("R", &format!("P{}", i));
            op.instantiate(ctx, mult, &format!("mult{}", i), &ports)?;
        }
        for i in 0..self.count {
            op.join_signal(&format!("P{}", i))?;
        }

        let ww = self.output_width();
        let mut acc = "P0".to_string();
        for i in 1..self.count {
            let delay = op.target().adder_delay(ww);
            op.accrue(delay)?;
            let a = op.consume(&acc)?;
            let p = op.consume(&format!("P{}", i))?;
            let name = format!("sop{}", i);
            op.declare(&name, ww, format!("{} + {}", a, p))?;
            acc = name;
        }
        let r = op.consume(&acc)?;
        op.declare_output("R", ww, r)
    }
}

// ── Floating-point negation ─────────────────────────────────────────────────

/// Flips the sign bit of a floating-point word, leaving exception, exponent
/// and fraction untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpNegate {
    pub we: u32,
    pub wf: u32,
}

impl Schedulable for FpNegate {
    fn name(&self) -> String {
        format!("FpNegate_{}_{}", self.we, self.wf)
    }

    fn build(&self, op: &mut Operator, _ctx: &mut GenerationContext) -> GenResult<()> {
        op.add_fp_input("X", self.we, self.wf)?;
        let delay = op.target().lut_delay();
        op.accrue(delay)?;
        let exc = op.consume_field("X", FpField::Exception)?;
        let sign = op.consume_field("X", FpField::Sign)?;
        let exp = op.consume_field("X", FpField::Exponent)?;
        let frac = op.consume_field("X", FpField::Fraction)?;
        op.declare_fp_output(
            "R",
            self.we,
            self.wf,
            format!("{{{}, ~{}, {}, {}}}", exc, sign, exp, frac),
        )
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::target::GenericTarget;

    fn ctx() -> GenerationContext {
        GenerationContext::new(GenerationConfig::default())
    }

    #[test]
    fn ceil_log2_values() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(5), 3);
    }

    #[test]
    fn chunk_width_fits_the_period() {
        let target = GenericTarget::from_config(&GenerationConfig::default());
        assert_eq!(chunk_width(&target, 8), 8);
        assert_eq!(chunk_width(&target, 128), 78);
        let flat = GenericTarget::from_config(&GenerationConfig {
            pipelined: false,
            ..GenerationConfig::default()
        });
        assert_eq!(chunk_width(&flat, 128), 128);
    }

    #[test]
    fn narrow_adder_is_combinational() {
        let mut ctx = ctx();
        let h = ctx.generate(&IntAdder { width: 8 }).unwrap();
        let op = ctx.operator(h).unwrap();
        assert_eq!(op.depth(), Some(0));
        assert!(!op.schedule().unwrap().sequential);
    }

    #[test]
    fn wide_adder_is_split_over_two_cycles() {
        let mut ctx = ctx();
        let h = ctx.generate(&IntAdder { width: 128 }).unwrap();
        let op = ctx.operator(h).unwrap();
        assert_eq!(op.depth(), Some(1));
        assert_eq!(op.schedule().unwrap().register_count, 3);
        assert!(op.signal("s0_d1").is_some());
    }

    #[test]
    fn multi_adder_rake_is_retimed() {
        let mut ctx = ctx();
        let h = ctx
            .generate(&MultiAdder {
                width: 16,
                count: 4,
            })
            .unwrap();
        let op = ctx.operator(h).unwrap();
        assert_eq!(op.depth(), Some(1));
        assert_eq!(op.signal("acc3").unwrap().cycle, 1);
        assert!(op.signal("X3_d1").is_some());
        assert!(op.signal("acc2_d1").is_some());
    }

    #[test]
    fn sum_of_products_waits_for_products() {
        let mut ctx = ctx();
        let h = ctx
            .generate(&SumOfProducts {
                width: 8,
                count: 3,
            })
            .unwrap();
        let mult = ctx.lookup("IntMultiplier_8x8").unwrap();
        let mult_depth = ctx.operator(mult).unwrap().depth().unwrap();
        let op = ctx.operator(h).unwrap();
        assert_eq!(op.instances().len(), 3);
        assert!(op.depth().unwrap() >= mult_depth);
        assert_eq!(op.signal("P2").unwrap().cycle, mult_depth);
        assert_eq!(ctx.emission_order().len(), 2);
    }

    #[test]
    fn fp_negate_flips_sign_field() {
        let mut ctx = ctx();
        let h = ctx.generate(&FpNegate { we: 8, wf: 23 }).unwrap();
        let op = ctx.operator(h).unwrap();
        let r = op.signal("R").unwrap();
        assert_eq!(r.width.bits(), 34);
        match &r.driver {
            crate::signal::Driver::Expr(e) => {
                assert_eq!(e, "{X[33:32], ~X[31], X[30:23], X[22:0]}")
            }
            other => panic!("unexpected driver {:?}", other),
        }
    }
}
