use anyhow::Result;
use sdmclient::{ExperimentRequest, SdmClient, SdmError};

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure the server via env vars or a `.lmclientrc` file.
    let client = SdmClient::from_env()?.with_remote_catalog();

    println!("algorithms: {}", client.list_algorithm_codes().join(", "));

    let hits = client.hint("Ursus", Some(5))?;
    let Some(hit) = hits.first() else {
        println!("no occurrence sets found");
        return Ok(());
    };
    println!("using occurrence set {} ({} points)", hit.id, hit.num_points);

    let mut bioclim = client.get_algorithm("bioclim")?;
    for name in bioclim.parameter_names() {
        println!("  {} = {:?}", name, bioclim.parameter(name)?.value());
    }
    bioclim.set_parameter("StandardDeviationCutoff", 1.645)?;

    let request = ExperimentRequest::new(bioclim, 12, hit.id).with_name("bioclim demo");
    match client.post_experiment(&request) {
        Ok(experiment) => println!("{}", experiment),
        Err(e) => match e.downcast_ref::<SdmError>() {
            Some(invalid) => eprintln!("fix the request and retry: {}", invalid),
            None => return Err(e),
        },
    }
    Ok(())
}
