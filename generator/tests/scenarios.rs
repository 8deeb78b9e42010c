// Scenario tests for the scheduling engine.
//
// Each test drives one operator through the public API the way an operator
// kind would, then checks cycles, delay stages and error kinds:
// - consumption one cycle later creates exactly one stage
// - same-cycle consumption creates none
// - consumption before declaration is a backward reference
// - composition with a depth-3 sub-operator
// - late sub-operator outputs charged however the cursor reaches their cycle
// - duplicate names, closed operators, port binding errors

use opgen::diag::{codes, PortDirection};
use opgen::{
    GenResult, GenerationConfig, GenerationContext, Operator, PortMap, Schedulable,
    ScheduleError,
};

// ── Test helpers ────────────────────────────────────────────────────────────

fn ctx() -> GenerationContext {
    let _ = env_logger::builder().is_test(true).try_init();
    GenerationContext::new(GenerationConfig::default())
}

/// Registers its 8-bit input `X` through `depth` explicit cycles.
struct Delay {
    depth: u32,
}

impl Schedulable for Delay {
    fn name(&self) -> String {
        format!("Delay_{}", self.depth)
    }

    fn build(&self, op: &mut Operator, _ctx: &mut GenerationContext) -> GenResult<()> {
        op.add_input("X", 8)?;
        for _ in 0..self.depth {
            op.advance_cycle()?;
        }
        let x = op.consume("X")?;
        op.declare_output("R", 8, x)
    }
}

// ── Delay chains ────────────────────────────────────────────────────────────

#[test]
fn consume_one_cycle_later_creates_one_stage() {
    let mut ctx = ctx();
    let mut op = ctx.create_operator("S1").unwrap();
    op.declare("x", 8, "8'd5").unwrap();
    op.advance_cycle().unwrap();
    assert_eq!(op.consume("x").unwrap(), "x_d1");

    let x = op.signal("x").unwrap().id;
    assert_eq!(op.chains().stages(x).len(), 1);
    assert_eq!(op.signal("x_d1").unwrap().cycle, 1);
}

#[test]
fn consume_at_declaration_cycle_returns_signal_unchanged() {
    let mut ctx = ctx();
    let mut op = ctx.create_operator("S2").unwrap();
    op.set_cycle(2).unwrap();
    op.declare("y", 8, "8'd1").unwrap();
    assert_eq!(op.consume("y").unwrap(), "y");
    assert_eq!(op.chains().register_count(), 0);
    assert_eq!(op.chains().requests().count(), 0);
}

#[test]
fn consume_before_declaration_is_backward_reference() {
    let mut ctx = ctx();
    let mut op = ctx.create_operator("S3").unwrap();
    op.set_cycle(1).unwrap();
    op.declare("z", 8, "8'd2").unwrap();
    op.set_cycle(0).unwrap();
    let err = op.consume("z").unwrap_err();
    assert_eq!(
        err.kind,
        ScheduleError::BackwardReference {
            name: "z".to_string(),
            declared: 1,
            requested: 0,
        }
    );
    assert_eq!(
        err.to_string(),
        "error[E0201]: in operator 'S3', consume(\"z\"): signal 'z' is declared at cycle 1 but used at cycle 0"
    );
}

#[test]
fn repeated_consumption_shares_stages() {
    let mut ctx = ctx();
    let mut op = ctx.create_operator("Shared").unwrap();
    op.add_input("a", 8).unwrap();
    op.set_cycle(3).unwrap();
    let first = op.consume("a").unwrap();
    let second = op.consume("a").unwrap();
    assert_eq!(first, second);
    op.set_cycle(1).unwrap();
    assert_eq!(op.consume("a").unwrap(), "a_d1");
    let a = op.signal("a").unwrap().id;
    assert_eq!(op.chains().stages(a).len(), 3);
}

// ── Composition ─────────────────────────────────────────────────────────────

#[test]
fn sub_operator_output_is_ready_after_its_depth() {
    let mut ctx = ctx();
    let sub = ctx.generate(&Delay { depth: 3 }).unwrap();
    assert_eq!(ctx.operator(sub).unwrap().depth(), Some(3));

    let mut op = ctx.create_operator("Parent").unwrap();
    op.add_input("a", 8).unwrap();
    op.instantiate(
        &ctx,
        sub,
        "d0",
        &PortMap::new().input("X", "a").output("R", "b"),
    )
    .unwrap();
    assert_eq!(op.signal("b").unwrap().cycle, 3);
    assert_eq!(op.instances()[0].output_cycle(), 3);

    op.set_cycle(2).unwrap();
    let err = op.consume("b").unwrap_err();
    assert!(matches!(
        err.kind,
        ScheduleError::BackwardReference {
            declared: 3,
            requested: 2,
            ..
        }
    ));

    op.jump_to_signal("a").unwrap();
    op.join_signal("b").unwrap();
    assert_eq!(op.current_cycle(), 3);
    assert_eq!(op.consume("b").unwrap(), "b");
}

#[test]
fn instance_inputs_are_aligned_to_the_input_cycle() {
    let mut ctx = ctx();
    let sub = ctx.generate(&Delay { depth: 1 }).unwrap();
    let mut op = ctx.create_operator("Late").unwrap();
    op.add_input("a", 8).unwrap();
    op.set_cycle(2).unwrap();
    op.instantiate(
        &ctx,
        sub,
        "d0",
        &PortMap::new().input("X", "a").output("R", "b"),
    )
    .unwrap();
    assert!(op.signal("a_d2").is_some());
    assert_eq!(op.signal("b").unwrap().cycle, 3);
}

#[test]
fn instance_input_declared_later_is_backward_reference() {
    let mut ctx = ctx();
    let sub = ctx.generate(&Delay { depth: 1 }).unwrap();
    let mut op = ctx.create_operator("Early").unwrap();
    op.set_cycle(2).unwrap();
    op.declare("late", 8, "8'd0").unwrap();
    op.set_cycle(0).unwrap();
    let err = op
        .instantiate(&ctx, sub, "d0", &PortMap::new().input("X", "late"))
        .unwrap_err();
    assert_eq!(err.code(), codes::E0201);
}

#[test]
fn port_binding_errors() {
    let mut ctx = ctx();
    let sub = ctx.generate(&Delay { depth: 1 }).unwrap();
    let mut op = ctx.create_operator("Binder").unwrap();
    op.add_input("a", 8).unwrap();
    op.add_input("narrow", 4).unwrap();

    let err = op
        .instantiate(&ctx, sub, "u0", &PortMap::new().input("Q", "a"))
        .unwrap_err();
    assert_eq!(
        err.kind,
        ScheduleError::UnknownPort {
            operator: "Delay_1".to_string(),
            direction: PortDirection::Input,
            formal: "Q".to_string(),
        }
    );

    let err = op
        .instantiate(&ctx, sub, "u0", &PortMap::new().output("R", "r"))
        .unwrap_err();
    assert_eq!(err.code(), codes::E0303);

    let err = op
        .instantiate(&ctx, sub, "u0", &PortMap::new().input("X", "narrow"))
        .unwrap_err();
    assert_eq!(
        err.kind,
        ScheduleError::WidthMismatch {
            formal: "X".to_string(),
            actual: "narrow".to_string(),
            expected: 8,
            found: 4,
        }
    );

    op.instantiate(&ctx, sub, "u0", &PortMap::new().input("X", "a"))
        .unwrap();
    let err = op
        .instantiate(&ctx, sub, "u0", &PortMap::new().input("X", "a"))
        .unwrap_err();
    assert_eq!(err.code(), codes::E0306);
}

#[test]
fn constants_can_drive_instance_inputs() {
    let mut ctx = ctx();
    let sub = ctx.generate(&Delay { depth: 2 }).unwrap();
    let mut op = ctx.create_operator("Const").unwrap();
    op.instantiate(
        &ctx,
        sub,
        "c0",
        &PortMap::new().constant("X", "8'd3").output("R", "three"),
    )
    .unwrap();
    op.join_signal("three").unwrap();
    let three = op.consume("three").unwrap();
    op.declare_output("R", 8, three).unwrap();
    op.finalize().unwrap();
    assert_eq!(op.depth(), Some(2));
}

/// Registers `X` through `depth` cycles, then spends `delay` ns on it, so
/// `R` arrives late in its cycle.
struct LateOutput {
    depth: u32,
    delay: f64,
}

impl Schedulable for LateOutput {
    fn name(&self) -> String {
        format!("Late_{}", self.depth)
    }

    fn build(&self, op: &mut Operator, _ctx: &mut GenerationContext) -> GenResult<()> {
        op.add_input("X", 8)?;
        for _ in 0..self.depth {
            op.advance_cycle()?;
        }
        op.accrue(self.delay)?;
        let x = op.consume("X")?;
        op.declare_output("R", 8, format!("~{}", x))
    }
}

/// Instantiates a depth-0 sub whose output arrives 2.0 ns into cycle 0, then
/// spends another 2.0 ns on it at 400 MHz (2.5 ns period).
fn late_operand_depth(join: bool) -> (u32, f64, String) {
    let mut ctx = ctx();
    let sub = ctx.generate(&LateOutput { depth: 0, delay: 2.0 }).unwrap();
    let itf = ctx.interface(sub).unwrap();
    assert_eq!((itf.depth, itf.outputs[0].delay), (0, 2.0));

    let mut op = ctx.create_operator("Chained").unwrap();
    op.add_input("a", 8).unwrap();
    op.instantiate(
        &ctx,
        sub,
        "l0",
        &PortMap::new().input("X", "a").output("R", "b"),
    )
    .unwrap();
    if join {
        op.join_signal("b").unwrap();
    }
    assert_eq!(op.critical_path(), 2.0);
    op.accrue(2.0).unwrap();
    let b = op.consume("b").unwrap();
    op.declare_output("Y", 8, format!("~{}", b)).unwrap();
    let cp = op.critical_path();
    op.finalize().unwrap();
    (op.depth().unwrap(), cp, b)
}

#[test]
fn sub_output_delay_counts_with_and_without_join() {
    for join in [true, false] {
        let (depth, cp, b) = late_operand_depth(join);
        assert_eq!(depth, 1, "join = {}", join);
        assert_eq!(cp, 2.0, "join = {}", join);
        assert_eq!(b, "b_d1", "join = {}", join);
    }
}

#[test]
fn sub_output_delay_counts_after_advance_or_jump() {
    let mut ctx = ctx();
    let sub = ctx.generate(&LateOutput { depth: 1, delay: 2.0 }).unwrap();

    let mut op = ctx.create_operator("Reached").unwrap();
    op.add_input("a", 8).unwrap();
    op.instantiate(
        &ctx,
        sub,
        "l0",
        &PortMap::new().input("X", "a").output("R", "b"),
    )
    .unwrap();
    assert_eq!(op.critical_path(), 0.0);

    op.jump_to_signal("b").unwrap();
    assert_eq!((op.current_cycle(), op.critical_path()), (1, 2.0));
    op.set_cycle(0).unwrap();
    op.advance_cycle().unwrap();
    assert_eq!((op.current_cycle(), op.critical_path()), (1, 2.0));

    // 2.0 + 1.0 exceeds the period: the work moves to cycle 2.
    op.accrue(1.0).unwrap();
    let b = op.consume("b").unwrap();
    op.declare_output("Y", 8, format!("~{}", b)).unwrap();
    assert_eq!(b, "b_d1");
    op.finalize().unwrap();
    assert_eq!(op.depth(), Some(2));
    let schedule = op.schedule().unwrap();
    assert!(schedule.cycles.iter().all(|c| c.peak_critical_path <= 2.5));
}

// ── Signal table and state machine ──────────────────────────────────────────

#[test]
fn duplicate_declaration_is_rejected() {
    let mut ctx = ctx();
    let mut op = ctx.create_operator("S5").unwrap();
    op.declare("s", 8, "8'd0").unwrap();
    let err = op.declare("s", 8, "8'd1").unwrap_err();
    assert_eq!(err.code(), codes::E0101);
    assert_eq!(err.operator, "S5");
    assert_eq!(err.call, "declare(\"s\")");
}

#[test]
fn unknown_signal_is_reported() {
    let mut ctx = ctx();
    let mut op = ctx.create_operator("U").unwrap();
    let err = op.consume("ghost").unwrap_err();
    assert_eq!(err.code(), codes::E0102);
}

#[test]
fn finalized_operator_rejects_every_mutation() {
    let mut ctx = ctx();
    let mut op = ctx.create_operator("Closed").unwrap();
    op.add_input("a", 8).unwrap();
    op.finalize().unwrap();

    assert_eq!(op.advance_cycle().unwrap_err().code(), codes::E0203);
    assert_eq!(op.set_cycle(1).unwrap_err().code(), codes::E0203);
    assert_eq!(op.accrue(0.1).unwrap_err().code(), codes::E0203);
    assert_eq!(op.join_signal("a").unwrap_err().code(), codes::E0203);
    assert_eq!(op.consume("a").unwrap_err().code(), codes::E0203);
    assert_eq!(op.add_input("b", 1).unwrap_err().code(), codes::E0203);
}

#[test]
fn join_is_a_monotone_maximum() {
    let mut ctx = ctx();
    let mut op = ctx.create_operator("Join").unwrap();
    op.set_cycle(3).unwrap();
    op.declare("A", 8, "8'd0").unwrap();
    op.set_cycle(5).unwrap();
    op.declare("B", 8, "8'd0").unwrap();

    op.jump_to_signal("A").unwrap();
    op.join_signal("B").unwrap();
    assert_eq!(op.current_cycle(), 5);
    op.join_signal("A").unwrap();
    assert_eq!(op.current_cycle(), 5);
}

#[test]
fn timing_failure_aborts_generation() {
    let mut ctx = GenerationContext::new(GenerationConfig {
        frequency_mhz: 2000.0,
        ..GenerationConfig::default()
    });
    let err = ctx
        .generate(&opgen::ops::IntAdder { width: 16 })
        .unwrap_err();
    assert_eq!(err.code(), codes::E0202);
    assert_eq!(err.operator, "IntAdder_16");
    assert!(ctx.operators().next().is_none());
}
