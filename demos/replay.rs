use gsq::{registry, Conf, GsqErr, ReplayTransport, ServerQuery};

fn main() -> Result<(), GsqErr> {
    let transport = ReplayTransport::from_json(include_str!("../tests/fixtures/arma3_koth.json"))?;
    let mut query = ServerQuery::with_transport(
        registry::lookup("arma3")?.clone(),
        Conf::create_with_port("127.0.0.1", 2302),
        Box::new(transport),
    );

    let info = query.fetch(false, true)?;
    println!("{}", info);

    Ok(())
}
