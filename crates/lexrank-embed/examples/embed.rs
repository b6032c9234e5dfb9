use lexrank_core::space::vector_similarity;
use lexrank_core::traits::Embedder;
use lexrank_embed::HashEmbedder;

fn main() -> anyhow::Result<()> {
    let embedder = HashEmbedder::new("hash-v1", 256);
    let texts = vec![
        "tenant security deposit refund".to_string(),
        "landlord must refund the security deposit".to_string(),
        "maritime salvage claims".to_string(),
    ];
    let embs = embedder.embed_batch(&texts)?;
    println!("B={} dim={}", embs.len(), embedder.dim());
    for (i, e) in embs.iter().enumerate().skip(1) {
        println!("sim(0,{})={:.3}", i, vector_similarity(&embs[0], e));
    }
    Ok(())
}
