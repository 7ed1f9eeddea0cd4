use {
    crate::error::SacError,
    anyhow::{
        anyhow,
        Result,
    },
    candle_nn::VarMap,
};


/// Soft (Polyak) update of the target parameters toward the local ones.
///
/// Parameters are paired by name, so both maps must come from networks built
/// with the same prefix and layout.
///
/// target = tau * local + (1.0 - tau) * target
pub fn soft_update(
    local: &VarMap,
    target: &VarMap,
    tau: f64,
) -> Result<()> {
    let local = local
        .data()
        .lock()
        .map_err(|_| SacError::PoisonedParameters)?;
    let target = target
        .data()
        .lock()
        .map_err(|_| SacError::PoisonedParameters)?;

    for (name, target_var) in target.iter() {
        let local_var = local
            .get(name)
            .ok_or_else(|| anyhow!("local network has no parameter named {name}"))?;
        let updated = if tau == 1.0 {
            local_var.as_tensor().copy()?
        } else {
            ((tau * local_var.as_tensor())? + ((1.0 - tau) * target_var.as_tensor())?)?
        };
        target_var.set(&updated)?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use {
        super::*,
        candle_core::{
            DType,
            Device,
            Tensor,
        },
        candle_nn::Init,
    };

    fn varmap_with(values: &[f32]) -> Result<VarMap> {
        let mut varmap = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        varmap.get((values.len(),), "fc0.weight", init, DType::F32, &Device::Cpu)?;
        varmap.set_one(
            "fc0.weight",
            Tensor::from_slice(values, (values.len(),), &Device::Cpu)?,
        )?;
        Ok(varmap)
    }

    fn values(varmap: &VarMap) -> Result<Vec<f32>> {
        let data = varmap.data().lock().unwrap();
        Ok(data.get("fc0.weight").unwrap().as_tensor().to_vec1::<f32>()?)
    }

    #[test]
    fn interpolates_toward_local() -> Result<()> {
        let local = varmap_with(&[1.0, 2.0, 3.0])?;
        let target = varmap_with(&[4.0, 5.0, 6.0])?;

        soft_update(&local, &target, 0.5)?;

        assert_eq!(values(&target)?, vec![2.5, 3.5, 4.5]);
        assert_eq!(values(&local)?, vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn tau_one_copies_exactly() -> Result<()> {
        let local = varmap_with(&[0.1, -7.25, 3.3333])?;
        let target = varmap_with(&[4.0, 5.0, 6.0])?;

        soft_update(&local, &target, 1.0)?;

        assert_eq!(values(&target)?, values(&local)?);
        Ok(())
    }

    #[test]
    fn tau_zero_keeps_target() -> Result<()> {
        let local = varmap_with(&[0.1, -7.25, 3.3333])?;
        let target = varmap_with(&[4.0, 5.0, 6.0])?;

        soft_update(&local, &target, 0.0)?;

        assert_eq!(values(&target)?, vec![4.0, 5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn mismatched_layout_is_an_error() -> Result<()> {
        let local = VarMap::new();
        let target = varmap_with(&[1.0])?;

        assert!(soft_update(&local, &target, 0.5).is_err());
        Ok(())
    }
}
