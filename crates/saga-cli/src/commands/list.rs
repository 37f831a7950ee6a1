use saga_flows::SagaKind;

pub(crate) fn run() {
    for (index, kind) in SagaKind::ALL.iter().enumerate() {
        if index > 0 {
            println!();
        }
        println!("{kind}: {}", kind.description());
        for (position, step) in kind.step_names().iter().enumerate() {
            println!("  {}. {step}", position + 1);
        }
    }
}
