use kube::CustomResourceExt;
use podsvc_operator::crd::PodSvc;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&PodSvc::crd())?);
    Ok(())
}
