use anyhow::Result;
use nnport::logging::{current_op, format_message, OpScope};

#[test]
fn logging_scope_prefixes_messages() -> Result<()> {
    assert_eq!(current_op(), None);
    assert_eq!(format_message(format_args!("bound {} inputs", 2)), "bound 2 inputs");

    {
        let _outer = OpScope::enter(3, "pool2d", Some("host"));
        assert_eq!(current_op().as_deref(), Some("#3 pool2d@host"));
        assert_eq!(
            format_message(format_args!("run {}", "x")),
            "[#3 pool2d@host] run x"
        );
        {
            let _inner = OpScope::enter(4, "prelu", None);
            assert_eq!(format_message(format_args!("ok")), "[#4 prelu] ok");
        }
        assert_eq!(current_op().as_deref(), Some("#3 pool2d@host"));
    }
    assert_eq!(current_op(), None);
    Ok(())
}

#[test]
fn logging_scope_is_per_thread() -> Result<()> {
    let _scope = OpScope::enter(1, "stack", Some("accel"));
    let other = std::thread::spawn(current_op)
        .join()
        .map_err(|_| anyhow::anyhow!("logging thread panicked"))?;
    assert_eq!(other, None);
    assert_eq!(current_op().as_deref(), Some("#1 stack@accel"));
    Ok(())
}
