use binform::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let reg = FormatRegistry::new();
    let person = RecordDescriptor::new("Person")
        .field(FieldSpec::new("age", TypeDescriptor::optional(TypeDescriptor::INT)))
        .field(FieldSpec::new("name", Primitive::Text))
        .field(FieldSpec::new("nick", Primitive::Text).with_format(Format::Utf16));
    reg.register_type("Person", person.into())?;

    let desc = TypeDescriptor::named("Person");
    let value = Value::Record(
        Record::new("Person")
            .with("age", 34u8)
            .with("name", "John Doe")
            .with("nick", "jd"),
    );
    let bytes = reg.encode(&value, &desc)?;
    println!("{desc}: {}", hex::encode(&bytes));

    let back = reg.decode(&bytes, &desc)?;
    assert_eq!(back, value);
    println!("{back:?}");

    // unregistered types are an error unless the fallback is enabled
    if let Err(e) = reg.encode(&value, &TypeDescriptor::named("Unknown")) {
        println!("{e}");
    }
    Ok(())
}
